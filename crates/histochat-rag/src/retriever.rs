//! Keyword graph lookup followed by embedding-similarity ranking.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{cosine_similarity, DynEmbeddingService};
use crate::error::RagError;
use crate::graph::{GraphFact, GraphStore};
use crate::keywords::extract_keywords;

/// A retrieved fact with its similarity to the question.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFact {
    pub fact: GraphFact,
    pub score: f32,
}

/// Selects the graph facts most relevant to a question.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn DynEmbeddingService>,
    top_k: usize,
    candidate_limit: usize,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self {
            store,
            embedder,
            top_k: 5,
            candidate_limit: 50,
            min_similarity: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn with_min_similarity(mut self, min: f32) -> Self {
        self.min_similarity = min;
        self
    }

    /// Up to `top_k` facts scoring at least `min_similarity`, best first.
    ///
    /// A question with no content words retrieves nothing.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredFact>, RagError> {
        let keywords = extract_keywords(question);
        if keywords.is_empty() {
            debug!("No keywords in question; skipping retrieval");
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .find_facts(&keywords, self.candidate_limit)
            .await?;
        if candidates.is_empty() {
            debug!(store = self.store.name(), ?keywords, "No candidate facts");
            return Ok(Vec::new());
        }

        // The question and every candidate go out in one embedding call.
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(question.to_string());
        texts.extend(candidates.iter().map(GraphFact::sentence));
        let vectors = self.embedder.embed_batch_boxed(&texts).await?;
        let Some((query, fact_vectors)) = vectors.split_first() else {
            return Err(RagError::Embedding("embedding service returned no vectors".to_string()));
        };
        if fact_vectors.len() != candidates.len() {
            return Err(RagError::Embedding(format!(
                "expected {} fact embeddings, got {}",
                candidates.len(),
                fact_vectors.len()
            )));
        }

        let mut scored: Vec<ScoredFact> = candidates
            .into_iter()
            .zip(fact_vectors)
            .map(|(fact, vector)| ScoredFact {
                score: cosine_similarity(query, vector),
                fact,
            })
            .filter(|s| s.score >= self.min_similarity)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.top_k);

        debug!(
            store = self.store.name(),
            keywords = keywords.len(),
            kept = scored.len(),
            "Retrieved facts"
        );
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingService, HashingEmbedding};
    use crate::graph::InMemoryGraph;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn retriever() -> Retriever {
        let graph = InMemoryGraph::new(vec![
            GraphFact::new("Shivaji", "BORN_AT", "Shivneri Fort"),
            GraphFact::new("Shivaji", "CROWNED_AT", "Raigad Fort"),
            GraphFact::new("Shivaji", "RAIDED", "Surat"),
            GraphFact::new("Afzal Khan", "DEFEATED_AT", "Pratapgad"),
        ]);
        Retriever::new(Arc::new(graph), Arc::new(HashingEmbedding::default()))
    }

    #[tokio::test]
    async fn test_retrieve_ranks_most_similar_first() {
        let facts = retriever().retrieve("Where was Shivaji born?").await.unwrap();
        assert!(!facts.is_empty());
        assert_eq!(facts[0].fact.object, "Shivneri Fort");
        assert!(facts.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_retrieve_respects_top_k() {
        let facts = retriever()
            .with_top_k(2)
            .retrieve("Shivaji")
            .await
            .unwrap();
        assert_eq!(facts.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_applies_similarity_floor() {
        let facts = retriever()
            .with_min_similarity(0.99)
            .retrieve("Where was Shivaji born?")
            .await
            .unwrap();
        assert!(facts.is_empty());
    }

    /// Counts calls while delegating to the hashing embedder.
    #[derive(Default)]
    struct CountingEmbedding {
        inner: HashingEmbedding,
        single_calls: AtomicUsize,
        batch_calls: AtomicUsize,
    }

    impl EmbeddingService for CountingEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            EmbeddingService::dimensions(&self.inner)
        }
    }

    #[tokio::test]
    async fn test_retrieve_embeds_all_candidates_in_one_call() {
        let embedder = Arc::new(CountingEmbedding::default());
        let retriever = Retriever::new(Arc::new(InMemoryGraph::sample().unwrap()), embedder.clone())
            .with_top_k(3);
        let facts = retriever.retrieve("Tell me about Shivaji").await.unwrap();

        assert!(!facts.is_empty());
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.single_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_without_keywords() {
        assert!(retriever().retrieve("who is he?").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_unknown_topic() {
        assert!(retriever().retrieve("Napoleon Waterloo").await.unwrap().is_empty());
    }
}
