//! aggkline runner: archive fetch, dataset store, publish gateway, pipeline driver.
//!
//! This crate builds on `aggkline-core` to provide:
//! - HTTP archive fetching behind the `ArchiveSource` trait
//! - The `DatasetStore` trait with Hugging Face Hub and in-memory implementations
//! - A read-only remote index snapshot taken once per run
//! - Publish-with-skip of Parquet outputs through a local staging directory
//! - The sequential per-URL driver with an append-only error log

pub mod error_log;
pub mod fetch;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod store;

pub use error_log::ErrorLog;
pub use fetch::{ArchiveSource, HttpFetcher};
pub use pipeline::{Pipeline, RunSummary, UrlOutcome};
pub use progress::{PipelineProgress, StdoutProgress};
pub use publish::{Materialize, PublishOutcome, Publisher};
pub use store::{DatasetStore, HubStore, MemoryStore, RemoteIndex, StoreError};
