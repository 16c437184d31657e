//! Hive-style object paths in the dataset repository.
//!
//! Layout:
//! - `agg_trades/symbol={SYMBOL}/month={YYYY-MM}/data.parquet`
//! - `klines/interval={INTERVAL}/symbol={SYMBOL}/month={YYYY-MM}/data.parquet`

use crate::interval::Interval;

const DATA_FILE: &str = "data.parquet";

/// Object path of the raw trade table for one symbol-month.
pub fn agg_trades_path(symbol: &str, month_str: &str) -> String {
    format!("agg_trades/symbol={symbol}/month={month_str}/{DATA_FILE}")
}

/// Object path of the kline table for one symbol-month at one interval.
pub fn kline_path(symbol: &str, month_str: &str, interval: Interval) -> String {
    format!("klines/interval={interval}/symbol={symbol}/month={month_str}/{DATA_FILE}")
}
