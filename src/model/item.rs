//! ContextItem: one piece of retrieved context plus its provenance.

use serde::{Deserialize, Serialize};
use super::{Metadata, Mode};

/// How an item was retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub mode: Mode,
    /// Name of the index or graph that produced the item.
    pub backend: String,
    /// Node ids from a traversal start node to this item. Empty for vector hits.
    #[serde(default)]
    pub graph_path: Vec<String>,
    /// Raw pre-fusion similarity score.
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub reranker_score: f64,
}

impl Provenance {
    pub fn new(mode: Mode, backend: impl Into<String>) -> Self {
        Self {
            mode,
            backend: backend.into(),
            graph_path: Vec::new(),
            similarity_score: 0.0,
            reranker_score: 0.0,
        }
    }
}

/// A retrieved item.
///
/// `id` is unique within a result set and never changes. `score` and
/// `provenance` are rewritten in place by fusion and reranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: String,
    pub content: String,
    pub source: String,
    /// Relevance, conventionally in [0, 1]. Fused scores may exceed 1.
    pub score: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub provenance: Provenance,
}

impl ContextItem {
    pub fn new(id: impl Into<String>, mode: Mode) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            source: String::new(),
            score: 0.0,
            metadata: Metadata::new(),
            provenance: Provenance::new(mode, ""),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.provenance.backend = backend.into();
        self
    }

    pub fn with_graph_path(mut self, path: Vec<String>) -> Self {
        self.provenance.graph_path = path;
        self
    }
}
