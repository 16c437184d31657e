//! Batch progress reporting.

use crate::pipeline::{RunSummary, UrlOutcome};
use aggkline_core::EtlError;

/// Progress callback for the per-URL loop.
pub trait PipelineProgress {
    /// Called before a URL is parsed.
    fn on_start(&self, url: &str, index: usize, total: usize);

    /// Called when a URL finishes, successfully or not.
    fn on_complete(
        &self,
        url: &str,
        index: usize,
        total: usize,
        result: &Result<UrlOutcome, EtlError>,
    );

    /// Called once after the last URL.
    fn on_batch_complete(&self, summary: &RunSummary);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl PipelineProgress for StdoutProgress {
    fn on_start(&self, url: &str, index: usize, total: usize) {
        println!("[{}/{}] {url}", index + 1, total);
    }

    fn on_complete(
        &self,
        url: &str,
        _index: usize,
        _total: usize,
        result: &Result<UrlOutcome, EtlError>,
    ) {
        match result {
            Ok(UrlOutcome::Skipped) => println!("  SKIP: {url} already exists in remote store"),
            Ok(UrlOutcome::Processed { uploaded, skipped }) => {
                println!("  OK: {uploaded} uploaded, {skipped} already present")
            }
            Err(e) => println!("  FAIL: Error processing URL: {url}. Error: {e}"),
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        println!(
            "\nRun complete: {}/{} processed, {} skipped, {} failed",
            summary.processed, summary.total, summary.skipped, summary.failed
        );
    }
}
