pub mod config;
pub mod storage;

use std::sync::Arc;

use anyhow::Context;
use dimse::DimseScp;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{self, fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::storage::FilesystemStore;

pub async fn run(config: Config) -> anyhow::Result<()> {
    init_logging(&config)?;

    tracing::info!("🔧 Starting Harmony Store '{}'", config.server.id);

    let store = FilesystemStore::new(&config.storage.store_dir)
        .context("Failed to initialise the object store")?;
    tracing::info!("📁 Storing received objects in {}", store.base_path().display());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Shutdown requested");
            signal.cancel();
        }
    });

    DimseScp::new(config.dimse, Arc::new(store))
        .run_until(shutdown)
        .await
        .context("DIMSE SCP failed")?;

    Ok(())
}

/// Initialise the tracing subscriber from the logging configuration
///
/// `RUST_LOG` takes precedence over the configured log level.
pub fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .context("Invalid log level")?;

    if config.logging.log_to_file {
        let file = std::fs::File::create(&config.logging.log_file_path).with_context(|| {
            format!(
                "Failed to create log file '{}'",
                config.logging.log_file_path
            )
        })?;
        let file_appender = fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(Arc::new(file));
        let stdout_appender = fmt::layer().with_file(true).with_line_number(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_appender)
            .with(stdout_appender)
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        let stdout_appender = fmt::layer().with_file(true).with_line_number(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_appender)
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}
