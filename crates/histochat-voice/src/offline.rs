//! Offline speech implementations for development and tests.
//!
//! The offline recognizer reads UTF-8 text payloads (`text/plain`) as the
//! spoken words, so the voice path can be exercised end to end without a
//! microphone. Real audio formats are rejected. The offline synthesizer
//! emits silent 16 kHz mono WAV audio whose length follows the text.

use async_trait::async_trait;
use tracing::debug;

use crate::error::VoiceError;
use crate::{check_upload, AudioFormat, SpeechToText, SynthesizedSpeech, TextToSpeech, Transcription};

const SAMPLE_RATE: u32 = 16_000;
/// Silence emitted per word of text.
const SAMPLES_PER_WORD: u32 = SAMPLE_RATE / 4;

#[derive(Debug, Clone)]
pub struct OfflineSpeechToText {
    language: String,
}

impl Default for OfflineSpeechToText {
    fn default() -> Self {
        Self::new("en")
    }
}

impl OfflineSpeechToText {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for OfflineSpeechToText {
    fn name(&self) -> &str {
        "offline"
    }

    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<Transcription, VoiceError> {
        let extension = check_upload(audio, mime)?;
        if extension != "txt" {
            return Err(VoiceError::Transcription(format!(
                "offline recognizer only accepts text/plain payloads, got {}",
                mime
            )));
        }
        let text = std::str::from_utf8(audio)
            .map_err(|e| VoiceError::Transcription(format!("payload is not UTF-8: {}", e)))?
            .trim()
            .to_string();
        debug!(text_len = text.len(), "Offline transcription");
        Ok(Transcription {
            text,
            language: self.language.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct OfflineTextToSpeech;

#[async_trait]
impl TextToSpeech for OfflineTextToSpeech {
    fn name(&self) -> &str {
        "offline"
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, VoiceError> {
        let words = text.split_whitespace().count() as u32;
        if words == 0 {
            return Err(VoiceError::Synthesis("cannot synthesize empty text".to_string()));
        }
        Ok(SynthesizedSpeech {
            bytes: silent_wav(words * SAMPLES_PER_WORD),
            format: AudioFormat::Wav,
        })
    }
}

/// A 16-bit PCM mono WAV file of `samples` zero samples.
fn silent_wav(samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_stt_reads_text_payload() {
        let stt = OfflineSpeechToText::default();
        let result = stt.transcribe(b"  hello  ", "text/plain; charset=utf-8").await.unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.language, "en");
    }

    #[tokio::test]
    async fn test_offline_stt_rejects_real_audio() {
        let stt = OfflineSpeechToText::default();
        let err = stt.transcribe(b"RIFF....", "audio/wav").await.unwrap_err();
        assert!(matches!(err, VoiceError::Transcription(_)));
        let err = stt.transcribe(&[0xff, 0xfe], "text/plain").await.unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[tokio::test]
    async fn test_offline_tts_produces_wav() {
        let speech = OfflineTextToSpeech.synthesize("hi there").await.unwrap();
        assert_eq!(speech.format, AudioFormat::Wav);
        assert_eq!(&speech.bytes[..4], b"RIFF");
        assert_eq!(&speech.bytes[8..12], b"WAVE");
        assert_eq!(speech.bytes.len(), 44 + 2 * 2 * SAMPLES_PER_WORD as usize);
    }

    #[tokio::test]
    async fn test_offline_tts_rejects_empty_text() {
        assert!(OfflineTextToSpeech.synthesize(" \n ").await.is_err());
    }

    #[test]
    fn test_silent_wav_header_sizes() {
        let wav = silent_wav(10);
        assert_eq!(wav.len(), 64);
        assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]), 56);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 20);
    }
}
