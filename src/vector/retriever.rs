//! Vector-backed [`Retriever`]: a thin adapter over a [`VectorIndex`].

use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;

use crate::model::{ContextItem, Mode, Query, RetrievalResult, ResultMetadata};
use crate::observe::{Observer, elapsed_ms};
use crate::retrieve::Retriever;
use crate::Result;
use super::{Embedder, VectorIndex};

/// Default number of hits requested when the query leaves `top_k` at 0.
pub const DEFAULT_TOP_K: usize = 10;

/// Similarity search as a retriever.
pub struct VectorRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    default_top_k: usize,
    min_score: f64,
    observer: Option<Arc<dyn Observer>>,
}

impl VectorRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            embedder: None,
            default_top_k: DEFAULT_TOP_K,
            min_score: 0.0,
            observer: None,
        }
    }

    /// Used for queries that carry no precomputed embedding.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Zero keeps the default.
    pub fn with_default_top_k(mut self, k: usize) -> Self {
        if k > 0 {
            self.default_top_k = k;
        }
        self
    }

    /// Floor applied when the query's `min_score` is 0.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    async fn query_embedding(&self, query: &Query) -> Result<Vec<f32>> {
        match (&query.embedding, &self.embedder) {
            (Some(e), _) if !e.is_empty() => Ok(e.clone()),
            (_, Some(embedder)) => embedder.embed(&query.text).await,
            // No embedding available: the index scores everything 0.
            (Some(e), None) => Ok(e.clone()),
            (None, None) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    #[tracing::instrument(skip_all, fields(backend = %self.index.name(), top_k = query.top_k))]
    async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        let start = Instant::now();

        let embedding = self.query_embedding(query).await?;
        let top_k = if query.top_k > 0 { query.top_k } else { self.default_top_k };

        let hits = self.index.search(&embedding, top_k, &query.filters).await?;

        let min_score = if query.min_score != 0.0 { query.min_score } else { self.min_score };
        let items: Vec<ContextItem> = hits
            .iter()
            .filter(|h| h.score >= min_score)
            .map(|h| {
                let mut item = ContextItem::new(h.node.id.clone(), Mode::Vector)
                    .with_content(h.node.content.clone())
                    .with_source(h.node.source.clone())
                    .with_score(h.score)
                    .with_backend(self.index.name());
                item.metadata = h.node.metadata.clone();
                item.provenance.similarity_score = h.score;
                item
            })
            .collect();

        let latency_ms = elapsed_ms(start);
        tracing::debug!(hits = hits.len(), kept = items.len(), latency_ms, "vector search done");
        if let Some(observer) = &self.observer {
            observer.on_vector_search(self.index.name(), top_k, items.len(), latency_ms);
        }

        let mut metadata = ResultMetadata {
            total_candidates: hits.len(),
            latency_ms,
            ..ResultMetadata::default()
        };
        metadata.modes_used.push(Mode::Vector);

        Ok(RetrievalResult { items, query: query.clone(), metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::testing::RecordingObserver;
    use crate::vector::{MemoryVectorIndex, VectorNode};
    use crate::Error;
    use pretty_assertions::assert_eq;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::Embedding("model offline".into()))
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    async fn index() -> Arc<MemoryVectorIndex> {
        let idx = MemoryVectorIndex::new("docs");
        idx.insert_batch(vec![
            VectorNode::new("x", vec![1.0, 0.0]).with_content("rust ownership").with_source("book"),
            VectorNode::new("y", vec![0.6, 0.8]),
            VectorNode::new("z", vec![0.0, 1.0]),
        ])
        .await
        .unwrap();
        Arc::new(idx)
    }

    #[tokio::test]
    async fn test_items_carry_vector_provenance() {
        let r = VectorRetriever::new(index().await);
        let res = r.retrieve(&Query::new("q").with_embedding(vec![1.0, 0.0])).await.unwrap();

        assert_eq!(res.ids(), vec!["x", "y", "z"]);
        let x = &res.items[0];
        assert_eq!(x.content, "rust ownership");
        assert_eq!(x.source, "book");
        assert_eq!(x.provenance.mode, Mode::Vector);
        assert_eq!(x.provenance.backend, "docs");
        assert_eq!(x.provenance.similarity_score, x.score);
        assert_eq!(res.metadata.total_candidates, 3);
        assert!(res.used(Mode::Vector));
    }

    #[tokio::test]
    async fn test_min_score_filters_but_counts_candidates() {
        let r = VectorRetriever::new(index().await);
        let q = Query::new("q").with_embedding(vec![1.0, 0.0]).with_min_score(0.5);
        let res = r.retrieve(&q).await.unwrap();
        assert_eq!(res.ids(), vec!["x", "y"]);
        assert_eq!(res.metadata.total_candidates, 3);

        let r = VectorRetriever::new(index().await).with_min_score(0.9);
        let res = r.retrieve(&Query::new("q").with_embedding(vec![1.0, 0.0])).await.unwrap();
        assert_eq!(res.ids(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_top_k_defaults_and_overrides() {
        let r = VectorRetriever::new(index().await).with_default_top_k(2);
        let res = r.retrieve(&Query::new("q").with_embedding(vec![1.0, 0.0])).await.unwrap();
        assert_eq!(res.len(), 2);
        let res = r.retrieve(&Query::new("q").with_embedding(vec![1.0, 0.0]).with_top_k(1)).await.unwrap();
        assert_eq!(res.len(), 1);
    }

    #[tokio::test]
    async fn test_embedder_used_without_query_embedding() {
        let r = VectorRetriever::new(index().await).with_embedder(Arc::new(FixedEmbedder(vec![0.0, 1.0])));
        let res = r.retrieve(&Query::new("q")).await.unwrap();
        assert_eq!(res.items[0].id, "z");
    }

    #[tokio::test]
    async fn test_embedder_error_propagates() {
        let r = VectorRetriever::new(index().await).with_embedder(Arc::new(FailingEmbedder));
        let err = r.retrieve(&Query::new("q")).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_observer_notified() {
        let observer = Arc::new(RecordingObserver::default());
        let r = VectorRetriever::new(index().await).with_observer(observer.clone());
        r.retrieve(&Query::new("q").with_embedding(vec![1.0, 0.0]).with_top_k(2)).await.unwrap();
        assert_eq!(observer.events.lock().as_slice(), &[("vector", "docs".to_string(), 2)]);
    }
}
