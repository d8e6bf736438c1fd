//! Language model abstraction and implementations.
//!
//! - `OpenAiChatModel` calls an OpenAI-compatible `/chat/completions` API.
//! - `OfflineModel` answers deterministically from the prompt itself, for
//!   tests and offline runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::RagError;
use crate::prompt;

/// Author of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message sent to a language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(PromptRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(PromptRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(PromptRole::Assistant, content)
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the next assistant message for `messages`.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, RagError>;
}

// ---------------------------------------------------------------------------
// OpenAiChatModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
            max_tokens,
        })
    }

    fn request_body(&self, messages: &[PromptMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

fn parse_completion(value: &Value) -> Result<String, RagError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RagError::Llm("response has no message content".to_string()))
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, RagError> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&self.request_body(messages));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::Llm(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("HTTP {}: {}", status, text)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| RagError::Llm(format!("invalid response body: {}", e)))?;
        let content = parse_completion(&value)?;
        debug!(
            model = %self.model,
            prompt_messages = messages.len(),
            answer_len = content.len(),
            "Chat completion"
        );
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// OfflineModel
// ---------------------------------------------------------------------------

/// Answer used when the context block holds no facts.
pub const OFFLINE_NO_CONTEXT_ANSWER: &str =
    "I do not know the answer to that from the knowledge graph.";

/// Deterministic model that reads its answer out of the prompt.
///
/// Condense prompts return the follow-up question unchanged, answer prompts
/// return the context facts, and anything else is echoed back.
#[derive(Debug, Clone, Default)]
pub struct OfflineModel;

#[async_trait]
impl LanguageModel for OfflineModel {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, RagError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == PromptRole::User)
            .ok_or_else(|| RagError::Llm("prompt has no user message".to_string()))?;

        if prompt::is_condense_request(messages) {
            return Ok(prompt::follow_up_question(&last_user.content)
                .unwrap_or_default()
                .to_string());
        }

        let context = messages
            .iter()
            .filter(|m| m.role == PromptRole::System)
            .find_map(|m| prompt::context_lines(&m.content));
        Ok(match context {
            Some(lines) if lines.is_empty() => OFFLINE_NO_CONTEXT_ANSWER.to_string(),
            Some(lines) => format!("Here is what I know: {}.", lines.join(". ")),
            None => format!("I heard: {}", last_user.content.trim()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphFact;

    #[test]
    fn test_prompt_message_serializes_lowercase_role() {
        let json = serde_json::to_value(PromptMessage::system("be brief")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be brief");
    }

    #[test]
    fn test_openai_request_body() {
        let model = OpenAiChatModel::new(
            "https://api.openai.com/v1/",
            "gpt-4o-mini",
            Some("sk-test".to_string()),
            0.2,
            256,
            Duration::from_secs(5),
        )
        .unwrap();
        let body = model.request_body(&[PromptMessage::user("hi")]);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(model.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_parse_completion() {
        let value = json!({
            "choices": [{ "message": { "role": "assistant", "content": "In 1674." } }]
        });
        assert_eq!(parse_completion(&value).unwrap(), "In 1674.");
        assert!(parse_completion(&json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn test_offline_model_answers_from_context() {
        let facts = vec![GraphFact::new("Shivaji", "CROWNED_AT", "Raigad Fort")];
        let msgs = prompt::answer_messages("sys", &facts, &[], 0, "Where was he crowned?");
        let answer = OfflineModel.complete(&msgs).await.unwrap();
        assert_eq!(answer, "Here is what I know: Shivaji crowned at Raigad Fort.");
    }

    #[tokio::test]
    async fn test_offline_model_without_context() {
        let msgs = prompt::answer_messages("sys", &[], &[], 0, "Who?");
        let answer = OfflineModel.complete(&msgs).await.unwrap();
        assert_eq!(answer, OFFLINE_NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn test_offline_model_condense_returns_follow_up() {
        let history = vec![histochat_core::types::ChatMessage::user("Who was Shivaji?")];
        let msgs = prompt::condense_messages(&history, 6, "Where was he born?");
        let answer = OfflineModel.complete(&msgs).await.unwrap();
        assert_eq!(answer, "Where was he born?");
    }

    #[tokio::test]
    async fn test_offline_model_echoes_question_with_condense_wording() {
        let msgs = prompt::direct_messages("sys", "What is a Standalone question:");
        let answer = OfflineModel.complete(&msgs).await.unwrap();
        assert_eq!(answer, "I heard: What is a Standalone question:");
    }

    #[tokio::test]
    async fn test_offline_model_direct_echo() {
        let msgs = prompt::direct_messages("sys", " hello ");
        assert_eq!(OfflineModel.complete(&msgs).await.unwrap(), "I heard: hello");
        assert!(OfflineModel.complete(&[]).await.is_err());
    }
}
