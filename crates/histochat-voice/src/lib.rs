//! histochat voice crate - speech-to-text, text-to-speech and audio artifacts.
//!
//! Provides trait-based abstractions for transcribing push-to-talk uploads
//! and synthesizing spoken answers, an OpenAI-compatible HTTP client, offline
//! implementations for tests and development, and the per-request store for
//! synthesized audio files.

pub mod audio_store;
pub mod error;
pub mod offline;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;

pub use audio_store::{AudioArtifact, AudioStore};
pub use error::VoiceError;
pub use offline::{OfflineSpeechToText, OfflineTextToSpeech};
pub use openai::OpenAiSpeechClient;

// =============================================================================
// Audio formats
// =============================================================================

/// Container format of synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// File extension for an uploaded audio MIME type, ignoring parameters such
/// as `;codecs=opus`. `None` for types speech recognition cannot take.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

// =============================================================================
// Results
// =============================================================================

/// Text recognized from an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    /// Language the recognizer was asked for or detected.
    pub language: String,
}

/// Synthesized speech held in memory until stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

// =============================================================================
// Traits
// =============================================================================

/// Turns an uploaded recording into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe `audio` encoded as `mime`.
    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<Transcription, VoiceError>;
}

/// Turns response text into spoken audio.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, VoiceError>;
}

/// Shared upload checks: non-empty, known format.
pub(crate) fn check_upload(audio: &[u8], mime: &str) -> Result<&'static str, VoiceError> {
    if audio.is_empty() {
        return Err(VoiceError::EmptyAudio);
    }
    extension_for_mime(mime).ok_or_else(|| VoiceError::UnsupportedFormat(mime.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("audio/webm;codecs=opus"), Some("webm"));
        assert_eq!(extension_for_mime("AUDIO/WAV"), Some("wav"));
        assert_eq!(extension_for_mime("audio/x-m4a"), Some("m4a"));
        assert_eq!(extension_for_mime("image/png"), None);
        assert_eq!(extension_for_mime(""), None);
    }

    #[test]
    fn test_audio_format_metadata() {
        assert_eq!(AudioFormat::Mp3.mime(), "audio/mpeg");
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Wav.extension(), "wav");
    }

    #[test]
    fn test_check_upload() {
        assert!(matches!(check_upload(&[], "audio/wav"), Err(VoiceError::EmptyAudio)));
        assert!(matches!(
            check_upload(b"RIFF", "application/pdf"),
            Err(VoiceError::UnsupportedFormat(_))
        ));
        assert_eq!(check_upload(b"RIFF", "audio/wav").unwrap(), "wav");
    }
}
