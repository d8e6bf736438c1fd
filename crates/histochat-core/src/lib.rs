pub mod config;
pub mod env;
pub mod error;
pub mod types;

pub use config::HistochatConfig;
pub use error::{HistochatError, Result};
pub use types::*;
