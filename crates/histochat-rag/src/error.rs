//! Error types for retrieval and answer generation.

use histochat_core::error::HistochatError;

/// Errors from the RAG pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("graph store error: {0}")]
    Graph(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("language model error: {0}")]
    Llm(String),
    #[error("language model returned an empty answer")]
    EmptyAnswer,
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<RagError> for HistochatError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Graph(msg) => HistochatError::Graph(msg),
            RagError::Embedding(msg) => HistochatError::Embedding(msg),
            RagError::Config(msg) => HistochatError::Config(msg),
            other => HistochatError::Llm(other.to_string()),
        }
    }
}
