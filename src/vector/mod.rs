//! # Vector Index
//!
//! `VectorIndex` is the contract between the vector retriever and any
//! similarity-search backend. Backends own their own concurrency safety and
//! return hits already scored in [0, 1].
//!
//! ## Implementations
//!
//! | Index | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryVectorIndex` | `memory` | Exact brute-force cosine, for tests/embedding |
//!
//! Embedding generation is not part of this crate: bring an [`Embedder`]
//! or put precomputed embeddings on the query.

pub mod memory;
pub mod retriever;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::model::Metadata;
use crate::Result;

pub use memory::MemoryVectorIndex;
pub use retriever::VectorRetriever;

/// An indexed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorNode {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub source: String,
    pub metadata: Metadata,
}

impl VectorNode {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
            ..Self::default()
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

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One hit from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub node: VectorNode,
    /// Similarity in [0, 1].
    pub score: f64,
}

/// Turns text into embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Default falls back to sequential `embed` calls.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model(&self) -> &str;
}

/// The similarity-search contract.
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    /// Name reported in provenance and observer events.
    fn name(&self) -> &str;

    /// The `k` nodes most similar to `embedding` whose metadata matches `filters`,
    /// best first.
    async fn search(&self, embedding: &[f32], k: usize, filters: &Metadata) -> Result<Vec<SearchResult>>;

    async fn insert(&self, node: VectorNode) -> Result<()>;

    async fn upsert(&self, node: VectorNode) -> Result<()>;

    /// Returns true if the node existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn len(&self) -> Result<usize>;

    /// Default falls back to sequential `insert` calls.
    async fn insert_batch(&self, nodes: Vec<VectorNode>) -> Result<()> {
        for node in nodes {
            self.insert(node).await?;
        }
        Ok(())
    }

    /// Default falls back to sequential `upsert` calls.
    async fn upsert_batch(&self, nodes: Vec<VectorNode>) -> Result<()> {
        for node in nodes {
            self.upsert(node).await?;
        }
        Ok(())
    }

    /// Default falls back to sequential `delete` calls.
    async fn delete_batch(&self, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Cosine similarity. Mismatched lengths, empty or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
