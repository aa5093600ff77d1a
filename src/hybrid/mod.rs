//! # Hybrid Orchestrator
//!
//! Combines a vector retriever and a graph retriever into one ranked result.
//!
//! ## Policies
//!
//! | Policy | Flow |
//! |--------|------|
//! | `Parallel` | both retrievers run concurrently; merge waits for both |
//! | `VectorThenGraph` | vector hits become entity hints for the graph pass |
//! | `GraphThenVector` | graph pass, then vector pass with the original query |
//!
//! `GraphThenVector` does not feed graph hits into the vector query.
//!
//! ## Pipeline
//!
//! ```text
//! policy ─▶ merge_results ─▶ [deduplicate] ─▶ rank_and_truncate ─▶ [rerank]
//! ```
//!
//! Any retriever or reranker error aborts the call; there are no partial
//! results and no retries. Missing retrievers contribute nothing.

pub mod fusion;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ContextItem, EntityHint, Mode, ModeSet, Query, RetrievalResult, ResultMetadata};
use crate::observe::{Observer, elapsed_ms};
use crate::retrieve::{Reranker, Retriever};
use crate::{Error, Result};

pub use fusion::{deduplicate, merge_results, rank_and_truncate};

// ============================================================================
// Configuration
// ============================================================================

/// How the two retrievers are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    #[default]
    Parallel,
    VectorThenGraph,
    GraphThenVector,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Parallel => "parallel",
            Policy::VectorThenGraph => "vector_then_graph",
            Policy::GraphThenVector => "graph_then_vector",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parallel" => Ok(Policy::Parallel),
            "vector_then_graph" => Ok(Policy::VectorThenGraph),
            "graph_then_vector" => Ok(Policy::GraphThenVector),
            other => Err(Error::InvalidConfig(format!("unknown policy '{other}'"))),
        }
    }
}

/// Per-source score multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub vector: f64,
    pub graph: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { vector: 0.6, graph: 0.4 }
    }
}

impl Weights {
    pub fn is_zero(&self) -> bool {
        self.vector == 0.0 && self.graph == 0.0
    }
}

/// Orchestrator settings. Deserializable from JSON:
///
/// ```json
/// { "policy": "vector_then_graph", "weights": { "vector": 0.7, "graph": 0.3 }, "dedup_by_id": true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridOptions {
    pub policy: Policy,
    pub weights: Weights,
    pub dedup_by_id: bool,
}

impl HybridOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_weights(mut self, vector: f64, graph: f64) -> Self {
        self.weights = Weights { vector, graph };
        self
    }

    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup_by_id = dedup;
        self
    }

    /// Weights must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("vector", self.weights.vector), ("graph", self.weights.graph)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} weight must be finite and >= 0, got {w}")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// Output of one policy run, before ranking.
#[derive(Default)]
struct Gathered {
    vector_items: Vec<ContextItem>,
    graph_items: Vec<ContextItem>,
    modes: ModeSet,
    total_candidates: usize,
}

impl Gathered {
    fn new() -> Self {
        let mut g = Self::default();
        g.modes.push(Mode::Hybrid);
        g
    }
}

/// The hybrid orchestrator.
pub struct HybridRetriever {
    vector: Option<Arc<dyn Retriever>>,
    graph: Option<Arc<dyn Retriever>>,
    options: HybridOptions,
    reranker: Option<Arc<dyn Reranker>>,
    observer: Option<Arc<dyn Observer>>,
}

impl HybridRetriever {
    /// Both-zero weights are replaced by [`Weights::default`].
    pub fn new(mut options: HybridOptions) -> Self {
        if options.weights.is_zero() {
            options.weights = Weights::default();
        }
        Self {
            vector: None,
            graph: None,
            options,
            reranker: None,
            observer: None,
        }
    }

    pub fn with_vector(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.vector = Some(retriever);
        self
    }

    pub fn with_graph(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.graph = Some(retriever);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &HybridOptions {
        &self.options
    }

    /// Fan out to both retrievers and wait for both before looking at
    /// either outcome. The vector error wins when both fail.
    async fn gather_parallel(&self, query: &Query) -> Result<Gathered> {
        let (vector, graph) = tokio::join!(
            invoke(self.vector.as_deref(), query),
            invoke(self.graph.as_deref(), query),
        );
        let vector = vector?;
        let graph = graph?;

        let mut out = Gathered::new();
        if let Some(res) = vector {
            out.total_candidates += res.metadata.total_candidates;
            if !res.items.is_empty() {
                out.modes.push(Mode::Vector);
            }
            out.vector_items = res.items;
        }
        if let Some(res) = graph {
            out.total_candidates += res.metadata.total_candidates;
            if !res.items.is_empty() {
                out.modes.push(Mode::Graph);
            }
            out.graph_items = res.items;
        }
        Ok(out)
    }

    /// Vector first; its hits seed the graph pass. No hits, no graph call.
    async fn gather_vector_then_graph(&self, query: &Query) -> Result<Gathered> {
        let mut out = Gathered::new();

        if let Some(res) = invoke(self.vector.as_deref(), query).await? {
            out.total_candidates += res.metadata.total_candidates;
            out.modes.push(Mode::Vector);
            out.vector_items = res.items;
        }

        if out.vector_items.is_empty() {
            return Ok(out);
        }

        let hints: Vec<EntityHint> = out
            .vector_items
            .iter()
            .map(|item| EntityHint::from_id(item.id.clone()))
            .collect();
        let graph_query = query.clone().with_entities(hints);

        if let Some(res) = invoke(self.graph.as_deref(), &graph_query).await? {
            out.total_candidates += res.metadata.total_candidates;
            out.modes.push(Mode::Graph);
            out.graph_items = res.items;
        }
        Ok(out)
    }

    /// Graph first, then vector with the unmodified query.
    async fn gather_graph_then_vector(&self, query: &Query) -> Result<Gathered> {
        let mut out = Gathered::new();

        if let Some(res) = invoke(self.graph.as_deref(), query).await? {
            out.total_candidates += res.metadata.total_candidates;
            out.modes.push(Mode::Graph);
            out.graph_items = res.items;
        }

        if let Some(res) = invoke(self.vector.as_deref(), query).await? {
            out.total_candidates += res.metadata.total_candidates;
            out.modes.push(Mode::Vector);
            out.vector_items = res.items;
        }
        Ok(out)
    }
}

/// Call a retriever if one is configured.
async fn invoke(retriever: Option<&dyn Retriever>, query: &Query) -> Result<Option<RetrievalResult>> {
    match retriever {
        Some(r) => r.retrieve(query).await.map(Some),
        None => Ok(None),
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    #[tracing::instrument(skip_all, fields(policy = %self.options.policy, top_k = query.top_k))]
    async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        if let Some(observer) = &self.observer {
            observer.on_retrieve_start(query);
        }
        let outcome = self.run(query).await;
        if let Some(observer) = &self.observer {
            observer.on_retrieve_end(query, outcome.as_ref());
        }
        outcome
    }
}

impl HybridRetriever {
    async fn run(&self, query: &Query) -> Result<RetrievalResult> {
        let start = Instant::now();

        let gathered = match self.options.policy {
            Policy::Parallel => self.gather_parallel(query).await?,
            Policy::VectorThenGraph => self.gather_vector_then_graph(query).await?,
            Policy::GraphThenVector => self.gather_graph_then_vector(query).await?,
        };
        tracing::debug!(
            vector = gathered.vector_items.len(),
            graph = gathered.graph_items.len(),
            candidates = gathered.total_candidates,
            "branches complete"
        );

        let mut items = merge_results(gathered.vector_items, gathered.graph_items, self.options.weights);
        if self.options.dedup_by_id {
            items = deduplicate(items);
        }
        let mut items = rank_and_truncate(items, query.top_k);

        if let Some(reranker) = &self.reranker {
            let rerank_start = Instant::now();
            let input_count = items.len();
            items = reranker.rerank(query, items).await?;
            if let Some(observer) = &self.observer {
                observer.on_rerank(reranker.name(), input_count, items.len(), elapsed_ms(rerank_start));
            }
        }

        let metadata = ResultMetadata {
            total_candidates: gathered.total_candidates,
            latency_ms: elapsed_ms(start),
            modes_used: gathered.modes,
            cache_hit: false,
        };
        tracing::debug!(returned = items.len(), latency_ms = metadata.latency_ms, "hybrid retrieval done");

        Ok(RetrievalResult { items, query: query.clone(), metadata })
    }
}

// ============================================================================
// Tests
// ============================================================================
