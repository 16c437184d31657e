//! aggkline core: archive URLs, trade schema, zip extraction, interval aggregation.
//!
//! This crate holds the pure, testable half of the pipeline:
//! - URL parsing and validation
//! - Raw trade schema and lazy CSV scanning of zipped archives
//! - Kline aggregation over fixed epoch-anchored windows
//! - Dataset object paths and pipeline configuration

pub mod aggregate;
pub mod archive;
pub mod config;
pub mod error;
pub mod interval;
pub mod paths;
pub mod schema;
pub mod url;

pub use aggregate::aggregate;
pub use archive::{extract, extract_in, RawTrades};
pub use config::{ConfigError, PipelineConfig};
pub use error::EtlError;
pub use interval::Interval;
pub use paths::{agg_trades_path, kline_path};
pub use schema::TradeSchema;
pub use url::{parse_url, url_list_from_str, ParsedUrl};
