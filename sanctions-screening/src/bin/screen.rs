//! Sanctions screening binary
//!
//! Reads newline-delimited JSON screening requests on stdin and writes one
//! JSON result per line on stdout. Logs go to stderr.
//!
//! ```text
//! sanctions-screen --config screening.toml < requests.ndjson
//! sanctions-screen                          # defaults + SCREENING_* variables
//! ```
//!
//! A line that is not valid UTF-8 or not a request gets an error record
//! (`{"line": n, "error": "..."}`) in its place, so output stays aligned with input.

use anyhow::Context;
use clap::Parser;
use sanctions_screening::ndjson::screen_line;
use sanctions_screening::{store, Config, Metrics, Screener, SnapshotCell, SnapshotRefresher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

const INITIAL_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Screen payments read as NDJSON from stdin against the sanctions lists
#[derive(Parser, Debug)]
#[command(name = "sanctions-screen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults plus SCREENING_* variables when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    tracing::info!("Starting DelTran sanctions screening v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_deref())?;
    let metrics = Metrics::new()?;

    let store = store::from_config(&config.store)
        .await
        .context("Failed to open sanctions store")?;

    let cell = SnapshotCell::new();
    let refresher = Arc::new(
        SnapshotRefresher::new(store, cell.clone(), config.refresh.interval())
            .with_timer(config.refresh.enabled)
            .with_metrics(metrics.clone()),
    );
    let screener = Screener::from_config(cell, &config).with_metrics(metrics);

    let cancel = CancellationToken::new();
    let mut versions = refresher.subscribe();
    let refresh_task = refresher.spawn(cancel.clone());

    match tokio::time::timeout(INITIAL_LOAD_TIMEOUT, versions.wait_for(|v| *v > 0)).await {
        Ok(Ok(_)) => tracing::info!(
            entities = screener.snapshot_len(),
            "Initial sanctions snapshot loaded"
        ),
        _ => tracing::warn!("No sanctions snapshot yet, screening against an empty list"),
    }

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Received shutdown signal");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            break;
        }
        line_no += 1;

        let Some(outcome) = screen_line(&screener, line_no, &buf) else {
            continue;
        };
        let mut out = serde_json::to_vec(&outcome)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    cancel.cancel();
    refresh_task.await?;

    tracing::info!("Sanctions screening stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("SCREENING_LOG_JSON").map(|v| v == "1").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::from_env()?,
    };
    tracing::info!(store = ?config.store, "Configuration loaded");
    Ok(config)
}
