//! skychatd: skychat relay daemon.

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use skychat_core::config::{HistoryBackend, LogConfig, SkychatConfig};
use skychat_services::{MemoryHistory, SharedHistory, SqliteHistory};

#[tokio::main]
async fn main() -> Result<()> {
    let arg = std::env::args().nth(1);
    if matches!(arg.as_deref(), Some("--version" | "-V")) {
        println!("skychatd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_result = SkychatConfig::load();
    let mut config = config_result.as_ref().cloned().unwrap_or_default();
    init_logging(&config.log)?;

    if let Err(e) = config_result {
        tracing::warn!(error = %e, "failed to load config, using defaults");
    }
    if let Err(e) = SkychatConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }

    if let Some(addr) = arg {
        config.server.listen_address = addr;
    }

    let history = open_history(&config)?;
    tracing::info!(backend = ?config.history.backend, "history backend ready");

    let listener = TcpListener::bind(&config.server.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_address))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let ctrl_c = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            let _ = ctrl_c.send(());
        }
    });

    skychatd::serve(listener, config.server, history, shutdown_tx).await
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    match &log.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

fn open_history(config: &SkychatConfig) -> Result<Option<SharedHistory>> {
    let store: SharedHistory = match config.history.backend {
        HistoryBackend::Disabled => return Ok(None),
        HistoryBackend::Memory => Arc::new(MemoryHistory::new()),
        HistoryBackend::Sqlite => {
            let path = &config.history.sqlite_path;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let db = SqliteHistory::open(path)
                .with_context(|| format!("failed to open history database {}", path.display()))?;
            tracing::info!(path = %path.display(), "sqlite history opened");
            Arc::new(db)
        }
    };
    Ok(Some(store))
}
