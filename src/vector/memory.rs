//! In-memory vector index.
//!
//! Exact brute-force cosine search over every stored node. Fine for tests
//! and small embedded corpora; not an ANN index.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use async_trait::async_trait;

use crate::model::{Metadata, matches_filters};
use crate::{Error, Result};
use super::{SearchResult, VectorIndex, VectorNode, cosine_similarity};

/// Brute-force cosine index. Cloning shares the underlying state.
#[derive(Clone)]
pub struct MemoryVectorIndex {
    inner: Arc<IndexInner>,
}

struct IndexInner {
    name: String,
    nodes: RwLock<HashMap<String, VectorNode>>,
}

impl MemoryVectorIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                name: name.into(),
                nodes: RwLock::new(HashMap::new()),
            }),
        }
    }
}

impl std::fmt::Debug for MemoryVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVectorIndex")
            .field("name", &self.inner.name)
            .field("nodes", &self.inner.nodes.read().len())
            .finish()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    fn name(&self) -> &str {
        &self.inner.name
    }

    /// Ties on score are broken by id so results are reproducible.
    async fn search(&self, embedding: &[f32], k: usize, filters: &Metadata) -> Result<Vec<SearchResult>> {
        let nodes = self.inner.nodes.read();
        let mut hits: Vec<(&VectorNode, f64)> = nodes
            .values()
            .filter(|n| matches_filters(&n.metadata, filters))
            .map(|n| (n, cosine_similarity(embedding, &n.embedding)))
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(node, score)| SearchResult { node: node.clone(), score })
            .collect())
    }

    async fn insert(&self, node: VectorNode) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        if nodes.contains_key(&node.id) {
            return Err(Error::Vector(format!("node {} already indexed", node.id)));
        }
        nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn upsert(&self, node: VectorNode) -> Result<()> {
        self.inner.nodes.write().insert(node.id.clone(), node);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.inner.nodes.write().remove(id).is_some())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.nodes.read().len())
    }
}
