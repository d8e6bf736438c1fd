//! Process environment handling.
//!
//! Loads `.env` files, reads collaborator secrets, and exports the LangSmith
//! tracing variables according to [`LangsmithKeyPolicy`].

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{LangsmithKeyPolicy, TracingConfig};
use crate::error::{HistochatError, Result};

pub const LANGSMITH_API_KEY: &str = "LANGSMITH_API_KEY";
pub const LANGCHAIN_TRACING_V2: &str = "LANGCHAIN_TRACING_V2";
pub const LANGCHAIN_ENDPOINT: &str = "LANGCHAIN_ENDPOINT";

/// Load variables from a `.env` file.
///
/// With an explicit path the file must exist. Without one, the nearest
/// `.env` in the current directory or its parents is used if present.
/// Variables already set in the process are never overwritten.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(p) => {
            dotenv::from_path(p).map_err(|e| {
                HistochatError::Environment(format!("failed to load {}: {}", p.display(), e))
            })?;
            info!(path = %p.display(), "Loaded environment file");
            Ok(Some(p.to_path_buf()))
        }
        None => match dotenv::dotenv() {
            Ok(found) => {
                info!(path = %found.display(), "Loaded environment file");
                Ok(Some(found))
            }
            Err(e) => {
                debug!(error = %e, "No .env file loaded");
                Ok(None)
            }
        },
    }
}

/// Read a non-empty environment variable.
pub fn secret_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Compute the tracing variables to export, given the current key value.
///
/// Kept separate from [`apply_tracing_env`] so the policy can be checked
/// without touching the process environment.
pub fn tracing_exports(
    config: &TracingConfig,
    current_key: Option<String>,
) -> Result<Vec<(&'static str, String)>> {
    let mut exports = Vec::with_capacity(3);

    match (current_key, config.langsmith_key_policy) {
        (Some(key), _) => exports.push((LANGSMITH_API_KEY, key)),
        (None, LangsmithKeyPolicy::Preserve) => {
            warn!("{} is not set; exporting the string \"None\"", LANGSMITH_API_KEY);
            exports.push((LANGSMITH_API_KEY, "None".to_string()));
        }
        (None, LangsmithKeyPolicy::Unset) => {
            debug!("{} is not set; leaving it unset", LANGSMITH_API_KEY);
        }
        (None, LangsmithKeyPolicy::Require) => {
            return Err(HistochatError::Environment(format!(
                "{} is required but not set",
                LANGSMITH_API_KEY
            )));
        }
    }

    exports.push((
        LANGCHAIN_TRACING_V2,
        if config.tracing_v2 { "true" } else { "false" }.to_string(),
    ));
    exports.push((LANGCHAIN_ENDPOINT, config.endpoint.clone()));
    Ok(exports)
}

/// Export the LangSmith tracing variables into the process environment.
///
/// Must run during startup before any collaborator reads the environment.
pub fn apply_tracing_env(config: &TracingConfig) -> Result<()> {
    let current = std::env::var(LANGSMITH_API_KEY).ok();
    for (name, value) in tracing_exports(config, current)? {
        std::env::set_var(name, value);
    }
    Ok(())
}
