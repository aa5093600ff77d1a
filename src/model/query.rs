//! Query: a retrieval request expressed as intent, not as backend calls.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use super::Metadata;

/// Retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Vector similarity search.
    Vector,
    /// Knowledge graph traversal.
    Graph,
    /// Fused vector + graph.
    Hybrid,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Vector => "vector",
            Mode::Graph => "graph",
            Mode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity hint used as a start node for graph traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityHint {
    pub id: String,
    /// Entity type (e.g. `"person"`, `"concept"`). Empty when unknown.
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

impl EntityHint {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Hint derived from a bare item identifier: the id doubles as the name.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id)
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// A retrieval request.
///
/// Immutable once handed to a retriever. Sub-queries (e.g. the graph pass of
/// a chained policy) are built from a clone.
///
/// Zero-valued `max_depth`, `top_k` and `min_score` mean "use the
/// retriever's default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub text: String,
    /// Precomputed embedding. When absent a vector retriever may embed `text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub entities: Vec<EntityHint>,
    /// Exact-match metadata filters.
    pub filters: Metadata,
    pub max_depth: usize,
    pub top_k: usize,
    pub min_score: f64,
    /// Requested strategies. Empty lets the retriever choose.
    pub modes: Vec<Mode>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_entity(mut self, hint: EntityHint) -> Self {
        self.entities.push(hint);
        self
    }

    /// Replace the entity hints.
    pub fn with_entities(mut self, hints: impl IntoIterator<Item = EntityHint>) -> Self {
        self.entities = hints.into_iter().collect();
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_modes(mut self, modes: impl IntoIterator<Item = Mode>) -> Self {
        self.modes = modes.into_iter().collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Entity hint ids in hint order, skipping empty ids.
    pub fn entity_ids(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|e| !e.id.is_empty())
            .map(|e| e.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Hybrid).unwrap(), "\"hybrid\"");
        let m: Mode = serde_json::from_str("\"graph\"").unwrap();
        assert_eq!(m, Mode::Graph);
        assert_eq!(Mode::Vector.to_string(), "vector");
    }

    #[test]
    fn test_entity_hint_from_id() {
        let hint = EntityHint::from_id("doc-7");
        assert_eq!(hint.id, "doc-7");
        assert_eq!(hint.name, "doc-7");
        assert_eq!(hint.entity_type, "");
        assert_eq!(hint.confidence, 0.0);
    }

    #[test]
    fn test_with_entities_replaces() {
        let q = Query::new("q")
            .with_entity(EntityHint::from_id("a"))
            .with_entities([EntityHint::from_id("b"), EntityHint::from_id("c")]);
        assert_eq!(q.entity_ids(), vec!["b", "c"]);
    }

    #[test]
    fn test_entity_ids_skip_empty() {
        let q = Query::new("q")
            .with_entity(EntityHint::new("", "nameless"))
            .with_entity(EntityHint::from_id("x"));
        assert_eq!(q.entity_ids(), vec!["x"]);
    }

    #[test]
    fn test_query_deserializes_with_defaults() {
        let q: Query = serde_json::from_str(r#"{"text": "rust", "top_k": 3}"#).unwrap();
        assert_eq!(q.text, "rust");
        assert_eq!(q.top_k, 3);
        assert_eq!(q.max_depth, 0);
        assert!(q.embedding.is_none());
        assert!(q.entities.is_empty());
    }
}
