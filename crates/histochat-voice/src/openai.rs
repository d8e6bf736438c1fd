//! OpenAI-compatible speech client.
//!
//! Transcription posts a multipart upload to `/audio/transcriptions`;
//! synthesis posts JSON to `/audio/speech` and receives MP3 bytes.

use std::time::Duration;

use async_trait::async_trait;
use histochat_core::config::VoiceConfig;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::VoiceError;
use crate::{check_upload, AudioFormat, SpeechToText, SynthesizedSpeech, TextToSpeech, Transcription};

#[derive(Debug, Clone)]
pub struct OpenAiSpeechClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    stt_model: String,
    tts_model: String,
    voice: String,
    language: String,
}

impl OpenAiSpeechClient {
    pub fn new(
        config: &VoiceConfig,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            stt_model: config.stt_model.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            language: config.language.clone(),
        })
    }

    fn speech_body(&self, text: &str) -> Value {
        json!({
            "model": self.tts_model,
            "input": text,
            "voice": self.voice,
            "response_format": AudioFormat::Mp3.extension(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl SpeechToText for OpenAiSpeechClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<Transcription, VoiceError> {
        let extension = check_upload(audio, mime)?;

        let part = Part::bytes(audio.to_vec())
            .file_name(format!("speech.{}", extension))
            .mime_str(mime)
            .map_err(|e| VoiceError::UnsupportedFormat(format!("{}: {}", mime, e)))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.stt_model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json");

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/audio/transcriptions", self.base_url)),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Transcription(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(VoiceError::Transcription(format!("HTTP {}: {}", status, text)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| VoiceError::Transcription(format!("invalid response body: {}", e)))?;
        let text = value["text"]
            .as_str()
            .ok_or_else(|| VoiceError::Transcription("response has no text".to_string()))?
            .trim()
            .to_string();

        info!(bytes = audio.len(), text_len = text.len(), "Transcription complete");
        Ok(Transcription {
            text,
            language: self.language.clone(),
        })
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeechClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, VoiceError> {
        if text.trim().is_empty() {
            return Err(VoiceError::Synthesis("cannot synthesize empty text".to_string()));
        }

        let response = self
            .authorized(self.client.post(format!("{}/audio/speech", self.base_url)))
            .json(&self.speech_body(text))
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Synthesis(format!("HTTP {}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("failed to read audio: {}", e)))?;
        if bytes.is_empty() {
            return Err(VoiceError::Synthesis("empty audio response".to_string()));
        }
        debug!(bytes = bytes.len(), voice = %self.voice, "Speech synthesized");
        Ok(SynthesizedSpeech {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mp3,
        })
    }
}
