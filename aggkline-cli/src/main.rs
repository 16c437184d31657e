//! aggkline CLI: publish futures aggTrades archives as trade and kline datasets.
//!
//! Reads a file of monthly archive URLs, and for each one downloads the archive,
//! uploads the raw trades and the 1m/5m/15m/30m/1h klines as Parquet to a Hugging Face
//! dataset repository. Outputs already in the repository are skipped, so reruns only
//! do missing work.

use aggkline_core::{url_list_from_str, EtlError, PipelineConfig};
use aggkline_runner::{
    DatasetStore, ErrorLog, HttpFetcher, HubStore, MemoryStore, Pipeline, RemoteIndex,
    StdoutProgress, StoreError,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "aggkline",
    about = "aggkline: futures aggTrades archives to hub-hosted trade and kline datasets"
)]
struct Cli {
    /// File with one archive URL per line.
    #[arg(long)]
    url_file: PathBuf,

    /// TOML config file. Defaults apply to every key it omits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset repository (owner/name), overrides the config.
    #[arg(long)]
    repo_id: Option<String>,

    /// Local staging directory for outputs before upload.
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Failure log path. Defaults to ./error.log.
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// Re-download and re-upload outputs that already exist in the repository.
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Process everything against an empty in-memory store; nothing is uploaded.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Hugging Face access token.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

fn main() -> Result<()> {
    // `.env` in the working directory (or a parent) may supply HF_TOKEN. Variables
    // already set in the environment take precedence.
    let dotenv_path = dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Some(path) = &dotenv_path {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let config = load_config(&cli)?;

    let content = std::fs::read_to_string(&cli.url_file)
        .with_context(|| format!("read URL file {}", cli.url_file.display()))?;
    let urls = url_list_from_str(&content);
    tracing::info!(urls = urls.len(), repo = %config.repo_id, "starting run");

    let fetcher = HttpFetcher::new(Duration::from_secs(config.http_timeout_secs))?;

    // Startup failures (login, listing) abort the process.
    let store: Box<dyn DatasetStore> = if cli.dry_run {
        tracing::warn!("dry run: publishing to an in-memory store");
        Box::new(MemoryStore::new())
    } else {
        let Some(token) = cli.token.as_deref() else {
            bail!("no access token: pass --token or set HF_TOKEN (environment or .env)");
        };
        let hub = HubStore::new(&config, token).map_err(remote_store)?;
        let user = hub
            .whoami()
            .map_err(remote_store)
            .context("login failed")?;
        tracing::info!(%user, repo = hub.repo_id(), "logged in");
        Box::new(hub)
    };

    let index = RemoteIndex::snapshot(store.as_ref())
        .map_err(remote_store)
        .with_context(|| format!("failed to list files in {}", config.repo_id))?;
    if index.is_empty() {
        tracing::info!(repo = %config.repo_id, "repository is empty, every URL will be processed");
    }

    let error_log = ErrorLog::new(&config.error_log);
    let summary = Pipeline::new(&config, &fetcher, store.as_ref(), &index)
        .with_force(cli.force)
        .run(&urls, &error_log, &StdoutProgress);

    if !summary.all_succeeded() {
        println!(
            "{} URL(s) failed, see {}",
            summary.failed,
            error_log.path().display()
        );
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(repo_id) = &cli.repo_id {
        config.repo_id = repo_id.clone();
    }
    if let Some(dir) = &cli.staging_dir {
        config.staging_dir = dir.clone();
    }
    if let Some(path) = &cli.error_log {
        config.error_log = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn remote_store(err: StoreError) -> EtlError {
    EtlError::RemoteStore(err.to_string())
}
