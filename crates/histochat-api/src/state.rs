//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use histochat_chat::ChatController;
use histochat_core::config::HistochatConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Mutable
/// session state lives inside the controller.
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration, fixed for the process lifetime.
    pub config: Arc<HistochatConfig>,
    pub controller: Arc<ChatController>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: HistochatConfig, controller: ChatController) -> Self {
        Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
            start_time: Instant::now(),
        }
    }
}
