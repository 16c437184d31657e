//! Structured error types for the ETL pipeline.
//!
//! Designed to be printed verbatim into the error log, so every variant
//! renders as a single human-readable line.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    /// The URL is malformed or not an eligible archive.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport failure or non-success HTTP status, on fetch or upload.
    #[error("network error: {0}")]
    Network(String),

    /// The archive has no readable entry or its table cannot be scanned.
    #[error("format error: {0}")]
    Format(String),

    /// Authentication or listing failure against the dataset store.
    #[error("remote store error: {0}")]
    RemoteStore(String),

    /// Local materialization failed (Parquet encode, staging directory, file I/O).
    #[error("staging error: {0}")]
    Staging(String),
}

impl EtlError {
    /// Short class name, logged as the `kind` field of per-URL failures.
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Validation(_) => "validation",
            EtlError::Network(_) => "network",
            EtlError::Format(_) => "format",
            EtlError::RemoteStore(_) => "remote_store",
            EtlError::Staging(_) => "staging",
        }
    }
}
