//! narrate-md - Convert a tree of Markdown notes into narrated audio.
//!
//! Documents are stripped of Markdown syntax, split into request-sized chunks,
//! synthesized through an OpenAI-compatible speech API and written as one
//! audio file per document, mirroring the input tree.

mod config;
mod convert;
mod session;
mod text;
mod tts;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use config::AppConfig;
use convert::Orchestrator;
use tts::OpenAiClient;

/// Wait for Ctrl+C or SIGTERM, then cancel the session.
async fn wait_for_shutdown(cancel: CancellationToken) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, cancelling...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        debug!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, cancelling...");
        }
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let config = AppConfig::from_args();

    // Respect RUST_LOG, then the verbose flag; prompts stay readable in interactive mode
    let default_level = if config.verbose {
        "debug"
    } else if config.is_batch() {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🔊 narrate-md v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }
    config.log_config();

    let client = Arc::new(OpenAiClient::new(&config.base_url)?);
    let orchestrator = Orchestrator::new(client, config.concurrency);

    let cancel = CancellationToken::new();
    let shutdown = tokio::spawn(wait_for_shutdown(cancel.clone()));

    let result = if config.is_batch() {
        session::run_batch(&config, &orchestrator, cancel.clone()).await
    } else {
        session::run_interactive(&config, &orchestrator, cancel.clone()).await
    };

    // Release the signal listener
    cancel.cancel();
    let _ = shutdown.await;

    if let Err(e) = result {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }

    info!("👋 Goodbye!");
    if !config.is_batch() {
        // A pending stdin read would hold up runtime shutdown
        std::process::exit(0);
    }
    Ok(())
}
