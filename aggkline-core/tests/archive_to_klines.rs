//! Integration tests: zip archive → staged CSV scan → kline aggregation.
//!
//! Tests:
//! 1. Raw scan returns every archive row under the trade schema
//! 2. Every interval conserves volume, taker volume and trade count
//! 3. Window starts are epoch-aligned, strictly increasing and begin at the first trade's window
//! 4. High/low bound open and close in every window

use aggkline_core::aggregate::DATETIME;
use aggkline_core::{aggregate, extract_in, Interval, RawTrades, TradeSchema};
use chrono::NaiveDate;
use polars::prelude::*;
use std::io::{Cursor, Write};

type Row = (i64, f64, f64, i64, i64, i64, bool);

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn start_ms() -> i64 {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(23, 30, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

/// 200 trades, one every 37 s from 2024-03-01 23:30 UTC, with contiguous trade ids.
/// Quantities are multiples of 0.25 so float sums are exact.
fn synthetic_rows() -> Vec<Row> {
    let t0 = start_ms();
    (0..200i64)
        .map(|i| {
            let id = i + 1;
            let price = 100.0 + (i % 7) as f64;
            let qty = 0.25 * (1 + i % 4) as f64;
            (id, price, qty, id, id, t0 + i * 37_000, i % 3 == 0)
        })
        .collect()
}

fn archive(rows: &[Row]) -> Vec<u8> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        csv.serialize(row).unwrap();
    }
    let csv = csv.into_inner().unwrap();

    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(
            "ETHUSDT-aggTrades-2024-03.csv",
            ::zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
    writer.write_all(&csv).unwrap();
    writer.finish().unwrap().into_inner()
}

fn staged(dir: &tempfile::TempDir) -> RawTrades {
    extract_in(&archive(&synthetic_rows()), dir.path()).unwrap()
}

fn f64_sum(df: &DataFrame, name: &str) -> f64 {
    df.column(name).unwrap().f64().unwrap().sum().unwrap()
}

fn f64_values(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn raw_scan_matches_archive() {
    let dir = tempfile::tempdir().unwrap();
    let raw = staged(&dir);
    assert_eq!(raw.entry_name(), "ETHUSDT-aggTrades-2024-03.csv");
    assert!(raw.staged_path().starts_with(dir.path()));

    let df = raw.lazy().unwrap().collect().unwrap();
    TradeSchema::validate(&df).unwrap();
    assert_eq!(df.height(), 200);
}

#[test]
fn every_interval_conserves_totals() {
    let rows = synthetic_rows();
    let volume: f64 = rows.iter().map(|r| r.2).sum();
    let taker: f64 = rows.iter().filter(|r| !r.6).map(|r| r.2).sum();

    let dir = tempfile::tempdir().unwrap();
    let raw = staged(&dir);

    for interval in Interval::ALL {
        let df = aggregate(raw.lazy().unwrap(), interval).collect().unwrap();
        assert_eq!(f64_sum(&df, "volume"), volume, "{interval}");
        assert_eq!(f64_sum(&df, "taker_buy_volume"), taker, "{interval}");
        let trades = df.column("num_trades").unwrap().i64().unwrap().sum();
        assert_eq!(trades, Some(200), "{interval}");
    }
}

#[test]
fn windows_are_aligned_and_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let raw = staged(&dir);
    let t0 = start_ms();

    for interval in Interval::ALL {
        let step = interval.millis();
        let df = aggregate(raw.lazy().unwrap(), interval).collect().unwrap();
        let starts: Vec<i64> = df
            .column(DATETIME)
            .unwrap()
            .datetime()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect();

        assert_eq!(starts[0], t0 - t0.rem_euclid(step), "{interval}");
        assert!(starts.iter().all(|s| s % step == 0), "{interval}");
        assert!(starts.windows(2).all(|w| w[0] < w[1]), "{interval}");
    }

    // 23:30 + 200 × 37 s ends at 01:32:43, so three hour windows starting at 23:00.
    let hourly = aggregate(raw.lazy().unwrap(), Interval::Hour1)
        .collect()
        .unwrap();
    let first_hour = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(23, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();
    assert_eq!(hourly.height(), 3);
    assert_eq!(
        hourly.column(DATETIME).unwrap().datetime().unwrap().get(0),
        Some(first_hour)
    );
}

#[test]
fn high_and_low_bound_every_window() {
    let dir = tempfile::tempdir().unwrap();
    let raw = staged(&dir);

    for interval in Interval::ALL {
        let df = aggregate(raw.lazy().unwrap(), interval).collect().unwrap();
        let open = f64_values(&df, "open");
        let high = f64_values(&df, "high");
        let low = f64_values(&df, "low");
        let close = f64_values(&df, "close");
        for i in 0..df.height() {
            assert!(high[i] >= open[i].max(close[i]), "{interval} row {i}");
            assert!(low[i] <= open[i].min(close[i]), "{interval} row {i}");
        }
    }
}
