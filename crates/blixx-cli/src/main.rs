//! BLIXX CLI - A command line client for the BLIXX movie streaming service.
//!
//! Sign in, browse and search the catalog, upload movies, and stream them
//! while watch progress is reported back to the server.

mod cli;
mod commands;
mod format;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use blixx_core::{ApiClient, Config};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;

/// Log file name prefix inside the cache directory's `logs/` folder
const LOG_FILE: &str = "blixx.log";

/// Initialize the tracing subscriber for logging.
///
/// Warnings go to stderr (override with RUST_LOG); a daily log file in the
/// cache directory keeps everything at info and above.
fn init_tracing(cache_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_filter(filter);

    let (file_layer, guard) = match cache_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let _guard = init_tracing(config.cache_dir().ok().as_deref());
    info!(command = ?cli.command, base_url = %config.base_url, "BLIXX CLI starting");

    let store = config.open_store()?;
    let client = Arc::new(ApiClient::new(
        config.base_url.clone(),
        store,
        config.request_timeout(),
    )?);

    commands::run(cli.command, client, &mut config).await
}
