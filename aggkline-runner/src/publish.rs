//! Publish gateway: skip-if-present, materialize to Parquet, upload, clean up.
//!
//! Local files are staging only. They are removed after a successful upload and
//! left in place when the upload fails, so a failed output can be inspected or
//! pushed by hand.

use crate::store::{DatasetStore, RemoteIndex};
use aggkline_core::schema::categorical;
use aggkline_core::{EtlError, PipelineConfig};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// What `publish` did with one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Already present in the remote index; nothing was written or uploaded.
    Skipped,
    Uploaded,
}

/// How an output plan becomes a Parquet file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialize {
    /// Streaming sink. The table is written batch by batch and never held whole.
    /// Falls back to `Collect` if the streaming engine rejects the plan.
    Stream,
    /// Collect into a `DataFrame`, then write. Used for dynamic-window kline plans.
    Collect,
}

pub struct Publisher<'a> {
    store: &'a dyn DatasetStore,
    index: &'a RemoteIndex,
    staging_dir: PathBuf,
    compression_level: i32,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn DatasetStore, index: &'a RemoteIndex, config: &PipelineConfig) -> Self {
        Self {
            store,
            index,
            staging_dir: config.staging_dir.clone(),
            compression_level: config.compression_level,
        }
    }

    /// Local staging location of an output path.
    pub fn staging_path(&self, output_path: &str) -> PathBuf {
        self.staging_dir.join(output_path)
    }

    /// Tag `table` with `symbol`/`month`, write it as zstd Parquet under the staging
    /// directory and upload it to `output_path`.
    pub fn publish(
        &self,
        output_path: &str,
        table: LazyFrame,
        symbol: &str,
        month_str: &str,
        skip_if_exists: bool,
        mode: Materialize,
    ) -> Result<PublishOutcome, EtlError> {
        if skip_if_exists && self.index.contains(output_path) {
            tracing::info!(path = output_path, "already in remote store, skipping upload");
            return Ok(PublishOutcome::Skipped);
        }

        let tagged = table.with_columns([
            lit(symbol).cast(categorical()).alias("symbol"),
            lit(month_str).cast(categorical()).alias("month"),
        ]);

        let local = self.staging_path(output_path);
        self.write_parquet(tagged, &local, mode)?;

        self.store
            .upload_file(&local, output_path, &format!("Uploaded {output_path}"))
            .map_err(|e| EtlError::Network(format!("upload {output_path}: {e}")))?;
        tracing::info!(path = output_path, "uploaded");

        fs::remove_file(&local).map_err(|e| {
            EtlError::Staging(format!("remove {}: {e}", local.display()))
        })?;
        tracing::info!(path = %local.display(), "removed local file");

        Ok(PublishOutcome::Uploaded)
    }

    /// Write the plan to `path`, creating parent directories.
    fn write_parquet(
        &self,
        table: LazyFrame,
        path: &Path,
        mode: Materialize,
    ) -> Result<(), EtlError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EtlError::Staging(format!("create dir {}: {e}", parent.display()))
            })?;
        }

        let level = ZstdLevel::try_new(self.compression_level)
            .map_err(|e| EtlError::Staging(format!("zstd level: {e}")))?;

        if mode == Materialize::Stream {
            let options = ParquetWriteOptions {
                compression: ParquetCompression::Zstd(Some(level)),
                ..Default::default()
            };
            match table.clone().sink_parquet(&path, options, None) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "streamed output");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "streaming sink failed, collecting instead"
                    );
                }
            }
        }

        let mut df = table
            .collect()
            .map_err(|e| EtlError::Format(format!("evaluate table for {}: {e}", path.display())))?;
        let file = fs::File::create(path)
            .map_err(|e| EtlError::Staging(format!("create {}: {e}", path.display())))?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(Some(level)))
            .finish(&mut df)
            .map_err(|e| EtlError::Staging(format!("write parquet {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), rows = df.height(), "materialized output");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const OUT: &str = "agg_trades/symbol=BTCUSDT/month=2024-01/data.parquet";

    fn table() -> LazyFrame {
        df![
            "agg_trade_id" => [1i64, 2],
            "price" => [100.0f64, 101.0],
        ]
        .unwrap()
        .lazy()
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            staging_dir: dir.to_path_buf(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn uploads_tagged_parquet_and_removes_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let index = RemoteIndex::default();
        let publisher = Publisher::new(&store, &index, &config(dir.path()));

        let outcome = publisher.publish(OUT, table(), "BTCUSDT", "2024-01", true, Materialize::Stream).unwrap();
        assert_eq!(outcome, PublishOutcome::Uploaded);
        assert!(!publisher.staging_path(OUT).exists());

        let commits = store.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, format!("Uploaded {OUT}"));

        let bytes = store.object(OUT).unwrap();
        let df = ParquetReader::new(std::io::Cursor::new(bytes)).finish().unwrap();
        assert_eq!(df.height(), 2);
        let symbol = df.column("symbol").unwrap();
        assert!(matches!(symbol.dtype(), DataType::Categorical(_, _)));
        let month = df.column("month").unwrap().cast(&DataType::String).unwrap();
        assert_eq!(month.str().unwrap().get(1), Some("2024-01"));
    }

    #[test]
    fn skips_paths_in_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let index = RemoteIndex::from_paths([OUT]);
        let publisher = Publisher::new(&store, &index, &config(dir.path()));

        let outcome = publisher.publish(OUT, table(), "BTCUSDT", "2024-01", true, Materialize::Collect).unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped);
        assert!(store.commits().is_empty());
        assert!(!publisher.staging_path(OUT).exists());
    }

    #[test]
    fn skip_disabled_republishes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let index = RemoteIndex::from_paths([OUT]);
        let publisher = Publisher::new(&store, &index, &config(dir.path()));

        let outcome = publisher.publish(OUT, table(), "BTCUSDT", "2024-01", false, Materialize::Collect).unwrap();
        assert_eq!(outcome, PublishOutcome::Uploaded);
        assert_eq!(store.commits().len(), 1);
    }

    #[test]
    fn upload_failure_keeps_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new().failing_uploads("agg_trades/");
        let index = RemoteIndex::default();
        let publisher = Publisher::new(&store, &index, &config(dir.path()));

        let err = publisher
            .publish(OUT, table(), "BTCUSDT", "2024-01", true, Materialize::Stream)
            .unwrap_err();
        assert!(matches!(err, EtlError::Network(_)));
        assert!(publisher.staging_path(OUT).exists());
    }

    fn staged_trades(dir: &Path) -> aggkline_core::RawTrades {
        use std::io::Write;
        let csv = "1,100.0,1.0,1,1,1704067200000,false\n\
                   2,101.0,2.0,2,3,1704067230000,true\n\
                   3,102.0,0.5,4,4,1704067290000,false\n";
        let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("BTCUSDT-aggTrades-2024-01.csv", ::zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(csv.as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        aggkline_core::extract_in(&bytes, dir).unwrap()
    }

    #[test]
    fn streams_scanned_trades_to_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let raw = staged_trades(dir.path());
        let store = MemoryStore::new();
        let index = RemoteIndex::default();
        let publisher = Publisher::new(&store, &index, &config(dir.path()));

        let outcome = publisher
            .publish(OUT, raw.lazy().unwrap(), "BTCUSDT", "2024-01", true, Materialize::Stream)
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Uploaded);

        let df = ParquetReader::new(std::io::Cursor::new(store.object(OUT).unwrap()))
            .finish()
            .unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 9);
        let quantity = df.column("quantity").unwrap().f64().unwrap();
        assert_eq!(quantity.sum(), Some(3.5));
    }

    #[test]
    fn stream_mode_still_publishes_kline_plans() {
        let dir = tempfile::tempdir().unwrap();
        let raw = staged_trades(dir.path());
        let store = MemoryStore::new();
        let index = RemoteIndex::default();
        let publisher = Publisher::new(&store, &index, &config(dir.path()));
        let out = "klines/interval=1m/symbol=BTCUSDT/month=2024-01/data.parquet";

        let klines = aggkline_core::aggregate(raw.lazy().unwrap(), aggkline_core::Interval::Minute1);
        publisher
            .publish(out, klines, "BTCUSDT", "2024-01", true, Materialize::Stream)
            .unwrap();

        let df = ParquetReader::new(std::io::Cursor::new(store.object(out).unwrap()))
            .finish()
            .unwrap();
        // 00:00:00 and 00:00:30 share a minute; 00:01:30 is the next one.
        assert_eq!(df.height(), 2);
        assert!(!publisher.staging_path(out).exists());
    }
}
