//! CLI argument definitions for the histochat server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

pub const CONFIG_ENV: &str = "HISTOCHAT_CONFIG";
pub const PORT_ENV: &str = "HISTOCHAT_PORT";
pub const HOST_ENV: &str = "HISTOCHAT_HOST";

/// histochat - talk to a historical figure grounded in a knowledge graph.
#[derive(Parser, Debug)]
#[command(name = "histochat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// API server bind address.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Environment file to load instead of the nearest `.env`.
    #[arg(long = "env-file")]
    pub env_file: Option<PathBuf>,

    /// Use in-process graph, embedding, model and speech implementations.
    #[arg(long = "offline")]
    pub offline: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > HISTOCHAT_CONFIG env var > ~/.histochat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > HISTOCHAT_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        pick_port(self.port, std::env::var(PORT_ENV).ok(), config_port)
    }

    /// Resolve the bind address.
    ///
    /// Priority: --host flag > HISTOCHAT_HOST env var > config file value.
    pub fn resolve_host(&self, config_host: &str) -> String {
        self.host
            .clone()
            .or_else(|| std::env::var(HOST_ENV).ok().filter(|h| !h.trim().is_empty()))
            .unwrap_or_else(|| config_host.to_string())
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > config file value. `RUST_LOG` still wins
    /// over both when the subscriber is built.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn pick_port(flag: Option<u16>, env: Option<String>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = env.and_then(|v| v.trim().parse::<u16>().ok()) {
        return p;
    }
    config_port
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".histochat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".histochat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
