//! Knowledge graph facts and the graph store abstraction.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Facts bundled with the crate for offline runs.
const SAMPLE_FACTS_JSON: &str = include_str!("../data/sample_facts.json");

/// One `(subject)-[relation]->(object)` edge of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphFact {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl GraphFact {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// Render the fact as a plain sentence, e.g. `Shivaji born at Shivneri Fort`.
    pub fn sentence(&self) -> String {
        let relation = self.relation.replace('_', " ").to_lowercase();
        format!("{} {} {}", self.subject, relation, self.object)
    }

    /// Case-insensitive substring match against any part of the fact.
    /// `keyword` must already be lowercase.
    pub fn mentions(&self, keyword: &str) -> bool {
        self.subject.to_lowercase().contains(keyword)
            || self.object.to_lowercase().contains(keyword)
            || self.relation.to_lowercase().contains(keyword)
    }
}

/// Source of graph facts relevant to a set of keywords.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Return up to `limit` facts touching any of `keywords` (lowercase).
    async fn find_facts(&self, keywords: &[String], limit: usize)
        -> Result<Vec<GraphFact>, RagError>;
}

/// In-process graph store over a fixed list of facts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    facts: Vec<GraphFact>,
}

impl InMemoryGraph {
    pub fn new(facts: Vec<GraphFact>) -> Self {
        Self { facts }
    }

    /// The facts bundled with the crate.
    pub fn sample() -> Result<Self, RagError> {
        Self::from_json(SAMPLE_FACTS_JSON)
    }

    /// Parse a JSON array of `{subject, relation, object}` records.
    pub fn from_json(json: &str) -> Result<Self, RagError> {
        let facts: Vec<GraphFact> = serde_json::from_str(json)
            .map_err(|e| RagError::Graph(format!("invalid facts JSON: {}", e)))?;
        Ok(Self::new(facts))
    }

    /// Load facts from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, RagError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::Graph(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn find_facts(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<GraphFact>, RagError> {
        let mut scored: Vec<(usize, &GraphFact)> = self
            .facts
            .iter()
            .map(|f| (keywords.iter().filter(|k| f.mentions(k)).count(), f))
            .filter(|(hits, _)| *hits > 0)
            .collect();
        // Stable sort keeps insertion order among equal hit counts.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, f)| f.clone())
            .collect())
    }
}
