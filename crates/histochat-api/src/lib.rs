//! histochat API crate - axum HTTP server and route handlers.
//!
//! Exposes sessions, view rendering, typed and spoken questions, audio
//! downloads, the theme record and a health check as a JSON API.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
