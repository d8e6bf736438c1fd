//! Error types for the chat controller.

use histochat_core::error::HistochatError;
use histochat_rag::RagError;
use histochat_voice::VoiceError;

/// Errors from the chat controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("question chain failed: {0}")]
    Chain(#[from] RagError),
    #[error("voice error: {0}")]
    Voice(#[from] VoiceError),
    #[error("voice input is disabled")]
    VoiceDisabled,
    #[error("no speech was captured")]
    NoSpeech,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Whether the error comes from a collaborator (graph, model, speech)
    /// rather than from the request itself.
    pub fn is_collaborator_failure(&self) -> bool {
        match self {
            ChatError::Chain(_) => true,
            ChatError::Voice(e) => matches!(
                e,
                VoiceError::Transcription(_)
                    | VoiceError::Synthesis(_)
                    | VoiceError::Storage(_)
                    | VoiceError::Io(_)
                    | VoiceError::Config(_)
            ),
            _ => false,
        }
    }
}

impl From<ChatError> for HistochatError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Chain(e) => e.into(),
            ChatError::Voice(e) => e.into(),
            other => HistochatError::Api(other.to_string()),
        }
    }
}
