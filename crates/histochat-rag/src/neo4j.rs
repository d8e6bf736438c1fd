//! Neo4j graph store over the HTTP transactional Cypher endpoint.
//!
//! Nodes are matched on their `name` property, falling back to `id` (the
//! property graph-extraction tooling writes). Relationship types are matched
//! too, so "crowned" finds `CROWNED_AT` edges.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::RagError;
use crate::graph::{GraphFact, GraphStore};

const FACT_QUERY: &str = "\
MATCH (a)-[r]->(b) \
WHERE any(k IN $keywords WHERE \
      toLower(coalesce(a.name, a.id, '')) CONTAINS k \
   OR toLower(coalesce(b.name, b.id, '')) CONTAINS k \
   OR toLower(type(r)) CONTAINS k) \
RETURN coalesce(a.name, a.id) AS subject, type(r) AS relation, coalesce(b.name, b.id) AS object \
LIMIT $limit";

/// Graph store backed by a Neo4j server.
#[derive(Debug, Clone)]
pub struct Neo4jHttpStore {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: Option<String>,
}

impl Neo4jHttpStore {
    /// Create a store for `database` on the server at `uri` (e.g. `http://localhost:7474`).
    pub fn new(
        uri: &str,
        database: &str,
        username: &str,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), database),
            username: username.to_string(),
            password,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(keywords: &[String], limit: usize) -> Value {
        json!({
            "statements": [{
                "statement": FACT_QUERY,
                "parameters": { "keywords": keywords, "limit": limit },
            }]
        })
    }

    /// Extract facts from a transactional endpoint response.
    ///
    /// Rows with a null subject or object are skipped.
    pub(crate) fn parse_response(value: &Value) -> Result<Vec<GraphFact>, RagError> {
        if let Some(first) = value
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errs| errs.first())
        {
            let code = first.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let message = first.get("message").and_then(Value::as_str).unwrap_or("");
            return Err(RagError::Graph(format!("{}: {}", code, message)));
        }

        let rows = value
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .and_then(|r| r.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| RagError::Graph("response has no result data".to_string()))?;

        let facts = rows
            .iter()
            .filter_map(|entry| {
                let row = entry.get("row")?.as_array()?;
                let field = |i: usize| row.get(i).and_then(Value::as_str).map(str::to_string);
                Some(GraphFact {
                    subject: field(0)?,
                    relation: field(1)?,
                    object: field(2)?,
                })
            })
            .collect();
        Ok(facts)
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    fn name(&self) -> &str {
        "neo4j"
    }

    async fn find_facts(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<GraphFact>, RagError> {
        if keywords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, self.password.as_ref())
            .header("Accept", "application/json")
            .json(&Self::request_body(keywords, limit))
            .send()
            .await
            .map_err(|e| RagError::Graph(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Graph(format!("HTTP {}: {}", status, body)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| RagError::Graph(format!("invalid response body: {}", e)))?;
        let facts = Self::parse_response(&value)?;
        debug!(keywords = keywords.len(), facts = facts.len(), "Neo4j fact lookup");
        Ok(facts)
    }
}
