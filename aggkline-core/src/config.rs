//! Pipeline configuration.
//!
//! Stored as TOML; every key is optional and falls back to the production default.
//!
//! ```toml
//! repo_id = "SleepPenguin/bfuus"
//! intervals = ["1m", "1h"]
//! compression_level = 3
//! ```

use crate::interval::Interval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset repository, `owner/name`.
    pub repo_id: String,
    /// Hub repository kind: `dataset`, `model` or `space`.
    pub repo_type: String,
    pub revision: String,
    /// Hub base URL.
    pub endpoint: String,
    /// Symbols must end with this quote currency.
    pub quote_suffix: String,
    /// Kline intervals published per archive, in order.
    pub intervals: Vec<Interval>,
    /// zstd level for Parquet output.
    pub compression_level: i32,
    /// Local directory where outputs are written before upload.
    pub staging_dir: PathBuf,
    /// Append-only failure log.
    pub error_log: PathBuf,
    /// Timeout for each HTTP request, archive downloads included.
    pub http_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repo_id: "SleepPenguin/bfuus".into(),
            repo_type: "dataset".into(),
            revision: "main".into(),
            endpoint: "https://huggingface.co".into(),
            quote_suffix: "USDT".into(),
            intervals: Interval::ALL.to_vec(),
            compression_level: 3,
            staging_dir: PathBuf::from("."),
            error_log: PathBuf::from("error.log"),
            http_timeout_secs: 600,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.repo_id.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "repo_id '{}' must be 'owner/name'",
                self.repo_id
            )));
        }
        if !matches!(self.repo_type.as_str(), "dataset" | "model" | "space") {
            return Err(ConfigError::Invalid(format!(
                "repo_type '{}' must be dataset, model or space",
                self.repo_type
            )));
        }
        if self.quote_suffix.is_empty() {
            return Err(ConfigError::Invalid("quote_suffix is empty".into()));
        }
        // zstd accepts 1..=22
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::Invalid(format!(
                "compression_level {} outside 1..=22",
                self.compression_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_dataset() {
        let config = PipelineConfig::default();
        assert_eq!(config.repo_id, "SleepPenguin/bfuus");
        assert_eq!(config.quote_suffix, "USDT");
        assert_eq!(config.intervals, Interval::ALL.to_vec());
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.error_log, PathBuf::from("error.log"));
        config.validate().unwrap();
    }

    #[test]
    fn empty_toml_yields_defaults() {
        assert_eq!(
            PipelineConfig::from_toml("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn partial_toml_overrides() {
        let config = PipelineConfig::from_toml(
            r#"
repo_id = "someone/klines"
intervals = ["1h", "5m"]
staging_dir = "/tmp/aggkline"
"#,
        )
        .unwrap();
        assert_eq!(config.repo_id, "someone/klines");
        assert_eq!(config.intervals, vec![Interval::Hour1, Interval::Minute5]);
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/aggkline"));
        assert_eq!(config.revision, "main");
    }

    #[test]
    fn rejects_unknown_interval() {
        let err = PipelineConfig::from_toml(r#"intervals = ["4h"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_compression_level() {
        let err = PipelineConfig::from_toml("compression_level = 40").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
