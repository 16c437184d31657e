//! Archive retrieval.
//!
//! The `ArchiveSource` trait abstracts over where archive bytes come from so the
//! pipeline can be driven by a canned source in tests. `HttpFetcher` is the real one:
//! one blocking GET per archive, no retries.

use aggkline_core::EtlError;
use std::time::Duration;

/// Source of raw archive bytes, keyed by URL.
pub trait ArchiveSource {
    /// Fetch the full archive body. Non-success responses are `EtlError::Network`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, EtlError>;
}

/// HTTP archive fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, EtlError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aggkline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EtlError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ArchiveSource for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, EtlError> {
        tracing::info!(%url, "downloading archive");

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| EtlError::Network(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EtlError::Network(format!("HTTP {status} for {url}")));
        }

        let body = resp
            .bytes()
            .map_err(|e| EtlError::Network(format!("failed to read body from {url}: {e}")))?;

        tracing::info!(%url, bytes = body.len(), "downloaded archive");
        Ok(body.into())
    }
}
