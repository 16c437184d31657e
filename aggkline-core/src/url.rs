//! Archive URL parsing and validation.
//!
//! Source archives are monthly futures aggregated-trade zips, e.g.
//! `https://data.binance.vision/data/futures/um/monthly/aggTrades/BTCUSDT/BTCUSDT-aggTrades-2024-01.zip`.
//! The file name carries the symbol (first `-` token) and the month (last two tokens).

use crate::error::EtlError;
use chrono::NaiveDate;

/// Markers every eligible URL must contain.
const REQUIRED_MARKERS: [&str; 3] = ["aggTrades", "futures", "monthly"];

const ARCHIVE_EXTENSION: &str = ".zip";

/// A validated archive URL, decomposed into its symbol and month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub url: String,
    pub file_name: String,
    pub symbol: String,
    /// `YYYY-MM`
    pub month_str: String,
}

/// Parse and validate an archive URL.
///
/// Fails with [`EtlError::Validation`] when a required marker is missing, when the
/// symbol does not end with `quote_suffix`, or when the month token is not a real
/// calendar month.
pub fn parse_url(url: &str, quote_suffix: &str) -> Result<ParsedUrl, EtlError> {
    for marker in REQUIRED_MARKERS {
        if !url.contains(marker) {
            return Err(EtlError::Validation(format!(
                "URL does not contain '{marker}': {url}"
            )));
        }
    }

    let file_name = url.rsplit('/').next().unwrap_or(url).to_string();
    let tokens: Vec<&str> = file_name.split('-').collect();
    let symbol = tokens[0].to_string();

    let tail_start = tokens.len().saturating_sub(2);
    let month_token = tokens[tail_start..].join("-");
    let month_str = month_token
        .strip_suffix(ARCHIVE_EXTENSION)
        .unwrap_or(&month_token)
        .to_string();

    if !symbol.ends_with(quote_suffix) {
        return Err(EtlError::Validation(format!(
            "symbol {symbol} does not end with '{quote_suffix}'"
        )));
    }

    if NaiveDate::parse_from_str(&format!("{month_str}-01"), "%Y-%m-%d").is_err() {
        return Err(EtlError::Validation(format!(
            "month '{month_str}' in {file_name} is not YYYY-MM"
        )));
    }

    let parsed = ParsedUrl {
        url: url.to_string(),
        file_name,
        symbol,
        month_str,
    };
    tracing::debug!(?parsed, "parsed URL");
    Ok(parsed)
}

/// Split the contents of a URL list file into URLs.
///
/// One URL per line; surrounding whitespace is trimmed, blank lines and `#` comments
/// are skipped.
pub fn url_list_from_str(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
