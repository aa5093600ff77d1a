//! # Retrieval Capabilities
//!
//! The traits the orchestrator is written against. It never sees a concrete
//! backend, only these capabilities behind `Arc<dyn ...>`.
//!
//! | Capability | Implemented by |
//! |------------|----------------|
//! | `Retriever` | `VectorRetriever`, `GraphRetriever`, `HybridRetriever`, `CachedRetriever` |
//! | `Reranker` | `Heuristic`, `CrossEncoder`, `Chain` |
//! | `Cache` | `MemoryCache` |

use std::sync::Arc;
use async_trait::async_trait;

use crate::model::{ContextItem, Query, RetrievalResult};
use crate::Result;

/// Executes a query and returns ranked context.
///
/// Cancellation is drop-based: an implementation must leave no shared state
/// half-updated if its future is dropped mid-flight.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &Query) -> Result<RetrievalResult>;
}

#[async_trait]
impl<R: Retriever + ?Sized> Retriever for Arc<R> {
    async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        (**self).retrieve(query).await
    }
}

/// Reorders, rescores, or drops items after fusion.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &Query, items: Vec<ContextItem>) -> Result<Vec<ContextItem>>;

    /// Model or strategy name reported to observers.
    fn name(&self) -> &str {
        "reranker"
    }
}

#[async_trait]
impl<R: Reranker + ?Sized> Reranker for Arc<R> {
    async fn rerank(&self, query: &Query, items: Vec<ContextItem>) -> Result<Vec<ContextItem>> {
        (**self).rerank(query, items).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Result cache keyed by query.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, query: &Query) -> Option<RetrievalResult>;

    async fn put(&self, query: &Query, result: &RetrievalResult) -> Result<()>;
}

// ============================================================================
// CachedRetriever
// ============================================================================

/// Serves repeat queries from a [`Cache`], delegating misses.
///
/// Cache writes are best effort: a failed `put` is logged and the fresh
/// result is still returned.
pub struct CachedRetriever<R, C> {
    inner: R,
    cache: C,
}

impl<R: Retriever, C: Cache> CachedRetriever<R, C> {
    pub fn new(inner: R, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

#[async_trait]
impl<R: Retriever, C: Cache> Retriever for CachedRetriever<R, C> {
    async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        if let Some(mut hit) = self.cache.get(query).await {
            tracing::debug!(query = %query.text, "cache hit");
            hit.metadata.cache_hit = true;
            return Ok(hit);
        }

        let result = self.inner.retrieve(query).await?;
        if let Err(e) = self.cache.put(query, &result).await {
            tracing::warn!(error = %e, "cache write failed");
        }
        Ok(result)
    }
}
