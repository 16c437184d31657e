//! Pipeline driver: runs each URL through parse → fetch → extract → publish.
//!
//! Per URL:
//! 1. Parse and validate the URL
//! 2. If the raw output is already in the remote index → done (no download)
//! 3. Fetch the archive and stage its entry
//! 4. Publish the raw trades
//! 5. Aggregate and publish each configured interval, in order
//!
//! A failure anywhere ends that URL only. It is reported, appended to the error log,
//! and the loop moves on.

use crate::error_log::ErrorLog;
use crate::fetch::ArchiveSource;
use crate::progress::PipelineProgress;
use crate::publish::{Materialize, PublishOutcome, Publisher};
use crate::store::{DatasetStore, RemoteIndex};
use aggkline_core::{
    agg_trades_path, aggregate, extract_in, kline_path, parse_url, EtlError, Interval,
    PipelineConfig,
};
use std::path::PathBuf;

/// Result of processing one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOutcome {
    /// Raw output already published; the archive was not downloaded.
    Skipped,
    /// Archive downloaded; counts are per output (raw + intervals).
    Processed { uploaded: usize, skipped: usize },
}

/// Summary of a batch run.
#[derive(Debug)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<(String, EtlError)>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub struct Pipeline<'a> {
    source: &'a dyn ArchiveSource,
    index: &'a RemoteIndex,
    publisher: Publisher<'a>,
    quote_suffix: String,
    intervals: Vec<Interval>,
    staging_dir: PathBuf,
    force: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &PipelineConfig,
        source: &'a dyn ArchiveSource,
        store: &'a dyn DatasetStore,
        index: &'a RemoteIndex,
    ) -> Self {
        Self {
            source,
            index,
            publisher: Publisher::new(store, index, config),
            quote_suffix: config.quote_suffix.clone(),
            intervals: config.intervals.clone(),
            staging_dir: config.staging_dir.clone(),
            force: false,
        }
    }

    /// Ignore the remote index: download every archive and upload every output.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Process every URL in order. Never stops early.
    pub fn run(
        &self,
        urls: &[String],
        error_log: &ErrorLog,
        progress: &dyn PipelineProgress,
    ) -> RunSummary {
        let total = urls.len();
        let mut summary = RunSummary {
            total,
            processed: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
        };

        for (i, url) in urls.iter().enumerate() {
            progress.on_start(url, i, total);
            let result = self.process_url(url);
            progress.on_complete(url, i, total, &result);

            match result {
                Ok(UrlOutcome::Skipped) => summary.skipped += 1,
                Ok(UrlOutcome::Processed { .. }) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!(%url, kind = e.kind(), error = %e, "URL failed");
                    if let Err(log_err) = error_log.append(url, &e) {
                        tracing::error!(
                            path = %error_log.path().display(),
                            error = %log_err,
                            "failed to write error log"
                        );
                    }
                    summary.failed += 1;
                    summary.failures.push((url.clone(), e));
                }
            }
        }

        progress.on_batch_complete(&summary);
        summary
    }

    /// Run one URL through the whole pipeline.
    pub fn process_url(&self, url: &str) -> Result<UrlOutcome, EtlError> {
        let parsed = parse_url(url, &self.quote_suffix)?;
        let raw_path = agg_trades_path(&parsed.symbol, &parsed.month_str);

        if !self.force && self.index.contains(&raw_path) {
            tracing::info!(%url, "already exists in remote store, skipping download and processing");
            return Ok(UrlOutcome::Skipped);
        }

        let bytes = self.source.fetch(url)?;

        std::fs::create_dir_all(&self.staging_dir).map_err(|e| {
            EtlError::Staging(format!(
                "create staging dir {}: {e}",
                self.staging_dir.display()
            ))
        })?;
        let raw = extract_in(&bytes, &self.staging_dir)?;
        drop(bytes);
        tracing::debug!(
            entry = raw.entry_name(),
            staged = %raw.staged_path().display(),
            "extracted archive"
        );

        let skip_if_exists = !self.force;
        let mut uploaded = 0;
        let mut skipped = 0;
        let mut tally = |outcome: PublishOutcome| match outcome {
            PublishOutcome::Uploaded => uploaded += 1,
            PublishOutcome::Skipped => skipped += 1,
        };

        tally(self.publisher.publish(
            &raw_path,
            raw.lazy()?,
            &parsed.symbol,
            &parsed.month_str,
            skip_if_exists,
            Materialize::Stream,
        )?);

        for &interval in &self.intervals {
            tracing::info!(%interval, symbol = %parsed.symbol, month = %parsed.month_str, "processing interval");
            let klines = aggregate(raw.lazy()?, interval);
            let out_path = kline_path(&parsed.symbol, &parsed.month_str, interval);
            tally(self.publisher.publish(
                &out_path,
                klines,
                &parsed.symbol,
                &parsed.month_str,
                skip_if_exists,
                Materialize::Collect,
            )?);
        }

        Ok(UrlOutcome::Processed { uploaded, skipped })
    }
}
