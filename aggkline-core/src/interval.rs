//! Kline intervals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed candlestick width. Labels follow the exchange convention (`1m`, `1h`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::Minute1,
        Interval::Minute5,
        Interval::Minute15,
        Interval::Minute30,
        Interval::Hour1,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
        }
    }

    /// Window width in milliseconds.
    pub fn millis(self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Interval::Minute1 => MINUTE,
            Interval::Minute5 => 5 * MINUTE,
            Interval::Minute15 => 15 * MINUTE,
            Interval::Minute30 => 30 * MINUTE,
            Interval::Hour1 => 60 * MINUTE,
        }
    }

    /// Window width as a polars duration (`1m` is one minute in polars syntax too).
    pub fn duration(self) -> polars::prelude::Duration {
        polars::prelude::Duration::parse(self.label())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.label() == s)
            .ok_or_else(|| {
                format!("unknown interval '{s}'. Valid: 1m, 5m, 15m, 30m, 1h")
            })
    }
}

impl TryFrom<String> for Interval {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.label().to_string()
    }
}
