//! histochat RAG crate - knowledge graph retrieval and answer generation.
//!
//! Provides the graph store, embedding, and language model abstractions,
//! their HTTP-backed and in-process implementations, and the chains that
//! turn a question (plus chat history) into an answer.

pub mod chain;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod keywords;
pub mod llm;
pub mod neo4j;
pub mod prompt;
pub mod retriever;

pub use chain::{DirectResponder, KnowledgeGraphChain, QuestionChain};
pub use embedding::{
    cosine_similarity, DynEmbeddingService, EmbeddingService, HashingEmbedding,
    HuggingFaceEmbedding,
};
pub use error::RagError;
pub use graph::{GraphFact, GraphStore, InMemoryGraph};
pub use llm::{LanguageModel, OfflineModel, OpenAiChatModel, PromptMessage, PromptRole};
pub use neo4j::Neo4jHttpStore;
pub use retriever::{Retriever, ScoredFact};
