use thiserror::Error;

/// Top-level error type for histochat.
///
/// Subsystem crates define their own error types and convert into or out of
/// `HistochatError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistochatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for HistochatError {
    fn from(err: toml::de::Error) -> Self {
        HistochatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HistochatError {
    fn from(err: toml::ser::Error) -> Self {
        HistochatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HistochatError {
    fn from(err: serde_json::Error) -> Self {
        HistochatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for histochat operations.
pub type Result<T> = std::result::Result<T, HistochatError>;
