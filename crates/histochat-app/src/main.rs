//! histochat application binary - composition root.
//!
//! 1. Load the environment file and configuration
//! 2. Export the tracing variables and start logging
//! 3. Build the graph, embedding, model and speech collaborators
//! 4. Start the expiry sweep and the axum API server

mod cli;
mod wiring;

use std::sync::Arc;

use clap::Parser;
use histochat_api::{start_server, AppState};
use histochat_chat::ChatController;
use histochat_core::env::{apply_tracing_env, load_dotenv};
use histochat_core::HistochatConfig;

use cli::CliArgs;

/// Interval between sweeps of idle sessions and expired audio files.
const PURGE_INTERVAL_SECS: u64 = 60;

async fn purge_loop(controller: Arc<ChatController>) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(PURGE_INTERVAL_SECS));
    loop {
        interval.tick().await;
        match controller.purge_expired().await {
            Ok((0, 0)) => {}
            Ok((sessions, audio)) => {
                tracing::debug!(sessions, audio, "Purged expired sessions and audio")
            }
            Err(e) => tracing::warn!(error = %e, "Expiry sweep failed"),
        }
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Environment and config load before the subscriber exists; their
    // outcome is logged once it does.
    let env_file = load_dotenv(args.env_file.as_deref());
    let config_path = args.resolve_config_path();
    let loaded = if config_path.exists() {
        Some(HistochatConfig::load(&config_path))
    } else {
        None
    };

    let mut config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            init_tracing("info");
            tracing::error!(path = %config_path.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
        None => HistochatConfig::default(),
    };

    init_tracing(&args.resolve_log_level(&config.server.log_level));
    tracing::info!("Starting histochat v{}", env!("CARGO_PKG_VERSION"));

    match env_file {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "Environment file loaded"),
        Ok(None) => tracing::debug!("No environment file"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load environment file");
            return Err(e.into());
        }
    }
    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_path.display(), "No configuration file; using defaults");
    }

    config.server.port = args.resolve_port(config.server.port);
    config.server.host = args.resolve_host(&config.server.host);
    if args.offline {
        config.force_offline();
        tracing::info!("Offline mode: using in-process collaborators");
    }
    config.validate()?;

    apply_tracing_env(&config.tracing)?;

    let controller = wiring::build_controller(&config).await?;
    let state = AppState::new(config, controller);

    tokio::spawn(purge_loop(Arc::clone(&state.controller)));

    start_server(state).await?;
    Ok(())
}
