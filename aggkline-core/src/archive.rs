//! Zip extraction and lazy CSV scanning of aggregated-trade archives.
//!
//! The archive's single entry is streamed to a staging file and scanned with
//! `LazyCsvReader`, so nothing is materialized until a consumer collects.

use crate::error::EtlError;
use crate::schema::TradeSchema;
use polars::prelude::*;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use ::zip::ZipArchive;

/// Raw trades of one archive, staged on disk.
///
/// The staging file is removed when the handle is dropped, so any `LazyFrame`
/// obtained from [`RawTrades::lazy`] must be collected while the handle is alive.
#[derive(Debug)]
pub struct RawTrades {
    staged: NamedTempFile,
    entry_name: String,
}

impl RawTrades {
    /// Name of the archive entry the trades came from.
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Path of the staged CSV entry.
    pub fn staged_path(&self) -> &Path {
        self.staged.path()
    }

    /// Lazy scan of the staged entry: headerless, fixed schema, malformed fields become
    /// null, rows without an `agg_trade_id` are dropped.
    pub fn lazy(&self) -> Result<LazyFrame, EtlError> {
        let mut lf = LazyCsvReader::new(self.staged.path())
            .with_has_header(false)
            .with_schema(Some(Arc::new(TradeSchema::schema())))
            .with_ignore_errors(true)
            .finish()
            .map_err(|e| EtlError::Format(format!("scan {}: {e}", self.entry_name)))?
            .filter(col(TradeSchema::AGG_TRADE_ID).is_not_null());

        let schema = lf
            .collect_schema()
            .map_err(|e| EtlError::Format(format!("resolve schema of {}: {e}", self.entry_name)))?;
        TradeSchema::validate_schema(&schema)
            .map_err(|e| EtlError::Format(format!("{}: {e}", self.entry_name)))?;

        Ok(lf)
    }
}

/// Extract the first entry of a zip archive into the system temp directory.
pub fn extract(bytes: &[u8]) -> Result<RawTrades, EtlError> {
    extract_in(bytes, &std::env::temp_dir())
}

/// Extract the first entry of a zip archive into a staging file under `dir`.
pub fn extract_in(bytes: &[u8], dir: &Path) -> Result<RawTrades, EtlError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| EtlError::Format(format!("failed to read zip archive: {e}")))?;

    if archive.is_empty() {
        return Err(EtlError::Format("zip archive has no entries".into()));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| EtlError::Format(format!("failed to open archive entry: {e}")))?;
    let entry_name = entry.name().to_string();

    let mut staged = tempfile::Builder::new()
        .prefix("aggkline-")
        .suffix(".csv")
        .tempfile_in(dir)
        .map_err(|e| EtlError::Staging(format!("create staging file in {}: {e}", dir.display())))?;

    std::io::copy(&mut entry, &mut staged)
        .map_err(|e| EtlError::Format(format!("decompress {entry_name}: {e}")))?;
    staged
        .flush()
        .map_err(|e| EtlError::Staging(format!("flush staging file: {e}")))?;

    tracing::debug!(entry = %entry_name, path = %staged.path().display(), "staged archive entry");

    Ok(RawTrades { staged, entry_name })
}
