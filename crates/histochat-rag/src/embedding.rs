//! Embedding service trait and implementations.
//!
//! - `HuggingFaceEmbedding` calls the HuggingFace Inference API
//!   feature-extraction pipeline for a sentence-transformer model
//!   (all-MiniLM-L6-v2 by default). This is the production backend.
//! - `HashingEmbedding` builds deterministic feature-hashed bag-of-words
//!   vectors in process, for tests and offline runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::RagError;
use crate::keywords::{is_content_word, tokenize};

/// Service for generating text embeddings.
///
/// Used for both sides of retrieval: the question and every candidate fact.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, RagError>> + Send;

    /// Embed several texts, one vector per input in order.
    ///
    /// The default embeds one text at a time; remote services override it
    /// with a single request.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, so it cannot be used as a
/// trait object. This trait boxes the future instead. Every
/// `EmbeddingService` gets it through the blanket implementation below.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>>;

    /// Embed several texts in one call (boxed future).
    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Cosine similarity of two vectors; 0.0 when either is all zeros or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// HuggingFaceEmbedding - HuggingFace Inference API
// ---------------------------------------------------------------------------

/// Embeddings from the HuggingFace Inference API feature-extraction pipeline.
///
/// Sentence-transformer models return one pooled vector per input; raw
/// transformer models return one vector per token, which is mean-pooled here.
#[derive(Debug, Clone)]
pub struct HuggingFaceEmbedding {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
    dimensions: usize,
}

impl HuggingFaceEmbedding {
    pub fn new(
        api_base: &str,
        model: &str,
        api_token: Option<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!(
                "{}/pipeline/feature-extraction/{}",
                api_base.trim_end_matches('/'),
                model
            ),
            api_token,
            dimensions,
        })
    }

    /// Endpoint this service posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, inputs: Value) -> Result<Value, RagError> {
        let mut request = self.client.post(&self.url).json(&serde_json::json!({
            "inputs": inputs,
            "options": { "wait_for_model": true },
        }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("HTTP {}: {}", status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid response body: {}", e)))
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), RagError> {
        if vector.len() != self.dimensions {
            return Err(RagError::Embedding(format!(
                "expected {} dimensions, model returned {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}

/// Split a batched feature-extraction response into one vector per input.
pub(crate) fn parse_feature_batch(value: &Value, expected: usize) -> Result<Vec<Vec<f32>>, RagError> {
    let items = value
        .as_array()
        .ok_or_else(|| RagError::Embedding("batch response is not an array".to_string()))?;
    if items.len() != expected {
        return Err(RagError::Embedding(format!(
            "expected {} embeddings, model returned {}",
            expected,
            items.len()
        )));
    }
    items.iter().map(parse_feature_vector).collect()
}

/// Turn a feature-extraction response into one normalized vector.
///
/// Accepts `[f32; D]`, `[[f32; D]; T]` (token level) and `[[[f32; D]; T]]`
/// (batched token level).
pub(crate) fn parse_feature_vector(value: &Value) -> Result<Vec<f32>, RagError> {
    fn as_floats(v: &Value) -> Option<Vec<f32>> {
        v.as_array()?
            .iter()
            .map(|x| x.as_f64().map(|f| f as f32))
            .collect()
    }

    let arr = value
        .as_array()
        .ok_or_else(|| RagError::Embedding("response is not an array".to_string()))?;
    if arr.is_empty() {
        return Err(RagError::Embedding("response is empty".to_string()));
    }

    let mut pooled = if arr[0].is_number() {
        as_floats(value)
            .ok_or_else(|| RagError::Embedding("non-numeric embedding value".to_string()))?
    } else {
        let rows: &Vec<Value> = if arr.len() == 1 && arr[0].get(0).is_some_and(Value::is_array) {
            arr[0].as_array().unwrap_or(arr)
        } else {
            arr
        };
        let tokens: Vec<Vec<f32>> = rows
            .iter()
            .map(as_floats)
            .collect::<Option<_>>()
            .ok_or_else(|| RagError::Embedding("malformed token embeddings".to_string()))?;
        let dim = tokens.first().map(Vec::len).unwrap_or(0);
        if dim == 0 || tokens.iter().any(|t| t.len() != dim) {
            return Err(RagError::Embedding("ragged token embeddings".to_string()));
        }
        let mut mean = vec![0.0f32; dim];
        for t in &tokens {
            for (m, x) in mean.iter_mut().zip(t) {
                *m += x;
            }
        }
        let n = tokens.len() as f32;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    };

    l2_normalize(&mut pooled);
    Ok(pooled)
}

impl EmbeddingService for HuggingFaceEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::Embedding("Cannot embed empty text".to_string()));
        }

        let value = self.post(Value::from(text)).await?;
        let vector = parse_feature_vector(&value)?;
        self.check_dimensions(&vector)?;
        debug!(dimensions = vector.len(), "Embedded text via HuggingFace");
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(RagError::Embedding("Cannot embed empty text".to_string()));
        }

        let value = self.post(Value::from(texts.to_vec())).await?;
        let vectors = parse_feature_batch(&value, texts.len())?;
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        debug!(inputs = texts.len(), "Embedded batch via HuggingFace");
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - deterministic feature hashing
// ---------------------------------------------------------------------------

/// Feature-hashed bag-of-words embedding.
///
/// Each content word is hashed to a signed bucket. Texts that share words
/// get a positive cosine similarity, which is enough to rank graph facts
/// without a model.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashingEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];
        for token in tokenize(text).iter().filter(|t| is_content_word(t)) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            result[bucket] += sign;
        }
        l2_normalize(&mut result);
        result
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
