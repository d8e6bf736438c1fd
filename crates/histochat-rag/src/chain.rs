//! Question chains: the conversational knowledge-graph chain and the direct
//! model responder used by the voice path.

use std::sync::Arc;

use async_trait::async_trait;
use histochat_core::config::RagConfig;
use histochat_core::types::ChatMessage;
use tracing::{debug, info};

use crate::embedding::DynEmbeddingService;
use crate::error::RagError;
use crate::graph::{GraphFact, GraphStore};
use crate::llm::LanguageModel;
use crate::prompt;
use crate::retriever::Retriever;

/// Turns a question and the conversation so far into an answer.
#[async_trait]
pub trait QuestionChain: Send + Sync {
    async fn ask(&self, question: &str, history: &[ChatMessage]) -> Result<String, RagError>;
}

fn non_empty_answer(raw: String) -> Result<String, RagError> {
    let answer = raw.trim();
    if answer.is_empty() {
        Err(RagError::EmptyAnswer)
    } else {
        Ok(answer.to_string())
    }
}

/// Retrieval-augmented chain over the knowledge graph.
pub struct KnowledgeGraphChain {
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    config: RagConfig,
}

impl KnowledgeGraphChain {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn DynEmbeddingService>,
        model: Arc<dyn LanguageModel>,
        config: RagConfig,
    ) -> Self {
        let retriever = Retriever::new(store, embedder)
            .with_top_k(config.top_k)
            .with_candidate_limit(config.candidate_limit)
            .with_min_similarity(config.min_similarity);
        Self {
            retriever,
            model,
            config,
        }
    }

    /// Rewrite a follow-up into a standalone question. Falls back to the
    /// original question when the model returns nothing.
    async fn condense(&self, question: &str, history: &[ChatMessage]) -> Result<String, RagError> {
        let messages = prompt::condense_messages(history, self.config.history_turns, question);
        let rewritten = self.model.complete(&messages).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            debug!(original = question, standalone = rewritten, "Condensed question");
            Ok(rewritten.to_string())
        }
    }
}

#[async_trait]
impl QuestionChain for KnowledgeGraphChain {
    async fn ask(&self, question: &str, history: &[ChatMessage]) -> Result<String, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let standalone = if self.config.condense_question && !history.is_empty() {
            self.condense(question, history).await?
        } else {
            question.to_string()
        };

        let facts: Vec<GraphFact> = self
            .retriever
            .retrieve(&standalone)
            .await?
            .into_iter()
            .map(|s| s.fact)
            .collect();

        let messages = prompt::answer_messages(
            &self.config.system_prompt,
            &facts,
            history,
            self.config.history_turns,
            question,
        );
        let answer = non_empty_answer(self.model.complete(&messages).await?)?;
        info!(
            model = self.model.name(),
            facts = facts.len(),
            history = history.len(),
            "Answered question"
        );
        Ok(answer)
    }
}

/// Plain model response with no retrieval; history is ignored.
pub struct DirectResponder {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl DirectResponder {
    pub fn new(model: Arc<dyn LanguageModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl QuestionChain for DirectResponder {
    async fn ask(&self, question: &str, _history: &[ChatMessage]) -> Result<String, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }
        let messages = prompt::direct_messages(&self.system_prompt, question);
        non_empty_answer(self.model.complete(&messages).await?)
    }
}
