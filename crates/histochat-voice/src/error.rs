//! Error types for speech recognition, synthesis and audio storage.

use histochat_core::error::HistochatError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("audio upload is empty")]
    EmptyAudio,
    #[error("audio upload of {size} bytes exceeds the {max} byte limit")]
    AudioTooLarge { size: usize, max: usize },
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("audio storage error: {0}")]
    Storage(String),
    #[error("audio artifact not found: {0}")]
    NotFound(Uuid),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VoiceError> for HistochatError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::Io(e) => HistochatError::Io(e),
            VoiceError::Config(msg) => HistochatError::Config(msg),
            other => HistochatError::Voice(other.to_string()),
        }
    }
}
