//! Interval aggregation: raw trades → OHLCV klines.
//!
//! Builds a lazy plan only. Windows are left-closed, labelled by their start, and
//! anchored to the Unix epoch; windows without trades are not emitted.

use crate::interval::Interval;
use crate::schema::{categorical, TradeSchema};
use polars::prelude::*;

pub const DATETIME: &str = "datetime";
pub const INTERVAL: &str = "interval";

/// Output columns after `datetime`, in order.
pub const KLINE_COLUMNS: [&str; 9] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "quote_volume",
    "num_trades",
    "taker_buy_volume",
    "taker_buy_quote_volume",
];

/// Aggregate a raw trade scan into one row per `interval` window.
pub fn aggregate(trades: LazyFrame, interval: Interval) -> LazyFrame {
    let every = interval.duration();
    let options = DynamicGroupOptions {
        every,
        period: every,
        offset: Duration::parse("0ns"),
        closed_window: ClosedWindow::Left,
        label: Label::Left,
        include_boundaries: false,
        start_by: StartBy::WindowBound,
        ..Default::default()
    };

    let price = || col(TradeSchema::PRICE);
    let quantity = || col(TradeSchema::QUANTITY);
    let notional = || quantity() * price();
    // Taker buy: the buyer removed liquidity.
    let taker = || col(TradeSchema::IS_BUYER_MAKER).not();

    trades
        .with_column(
            col(TradeSchema::TRANSACT_TIME)
                .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
                .alias(DATETIME),
        )
        .sort(
            [DATETIME],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .group_by_dynamic(col(DATETIME), Vec::<Expr>::new(), options)
        .agg([
            price().first().alias("open"),
            price().max().alias("high"),
            price().min().alias("low"),
            price().last().alias("close"),
            quantity().sum().alias("volume"),
            notional().sum().alias("quote_volume"),
            (col(TradeSchema::LAST_TRADE_ID).last() - col(TradeSchema::FIRST_TRADE_ID).first()
                + lit(1i64))
            .alias("num_trades"),
            when(taker())
                .then(quantity())
                .otherwise(lit(0.0))
                .sum()
                .alias("taker_buy_volume"),
            when(taker())
                .then(notional())
                .otherwise(lit(0.0))
                .sum()
                .alias("taker_buy_quote_volume"),
        ])
        .with_column(lit(interval.label()).cast(categorical()).alias(INTERVAL))
        .select(output_columns())
}

/// `datetime`, the kline columns, then the `interval` tag.
fn output_columns() -> Vec<Expr> {
    std::iter::once(DATETIME)
        .chain(KLINE_COLUMNS)
        .chain([INTERVAL])
        .map(col)
        .collect()
}
