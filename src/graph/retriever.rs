//! Graph-backed [`Retriever`]: entity hints in, scored traversal out.

use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;

use crate::model::{ContextItem, Mode, Query, RetrievalResult, ResultMetadata};
use crate::observe::{Observer, elapsed_ms};
use crate::retrieve::Retriever;
use crate::Result;
use super::{EdgeWeights, KnowledgeGraph, TraversalOptions};

pub const DEFAULT_DEPTH: usize = 2;
pub const DEFAULT_MAX_NODES: usize = 20;

/// Knowledge-graph traversal as a retriever.
///
/// Start nodes are the query's entity hints. Without hints, every node
/// matching the query filters becomes a start node. Each reached node is
/// scored by its decayed path score.
pub struct GraphRetriever {
    graph: Arc<dyn KnowledgeGraph>,
    default_depth: usize,
    default_max_nodes: usize,
    edge_types: Vec<String>,
    observer: Option<Arc<dyn Observer>>,
}

impl GraphRetriever {
    pub fn new(graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self {
            graph,
            default_depth: DEFAULT_DEPTH,
            default_max_nodes: DEFAULT_MAX_NODES,
            edge_types: Vec::new(),
            observer: None,
        }
    }

    /// Zero keeps the default.
    pub fn with_default_depth(mut self, depth: usize) -> Self {
        if depth > 0 {
            self.default_depth = depth;
        }
        self
    }

    /// Zero keeps the default.
    pub fn with_default_max_nodes(mut self, max_nodes: usize) -> Self {
        if max_nodes > 0 {
            self.default_max_nodes = max_nodes;
        }
        self
    }

    /// Edge types followed on every traversal. Empty follows all.
    pub fn with_edge_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.edge_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    async fn start_nodes(&self, query: &Query) -> Result<Vec<String>> {
        let hinted = query.entity_ids();
        if !hinted.is_empty() {
            return Ok(hinted);
        }
        let found = self.graph.find_nodes("", &query.filters).await?;
        Ok(found.into_iter().map(|n| n.id).collect())
    }
}

#[async_trait]
impl Retriever for GraphRetriever {
    #[tracing::instrument(skip_all, fields(backend = %self.graph.name(), hints = query.entities.len()))]
    async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        let start = Instant::now();

        let start_nodes = self.start_nodes(query).await?;
        if start_nodes.is_empty() {
            tracing::debug!("no start nodes");
            return Ok(RetrievalResult::empty(query.clone(), Mode::Graph));
        }

        let depth = if query.max_depth > 0 { query.max_depth } else { self.default_depth };
        let opts = TraversalOptions {
            depth,
            edge_types: self.edge_types.clone(),
            node_types: Vec::new(),
            max_nodes: if query.top_k > 0 { query.top_k } else { self.default_max_nodes },
            min_weight: query.min_score,
        };

        let traversal = self.graph.traverse(&start_nodes, &opts).await?;

        let weights = EdgeWeights::from_edges(&traversal.edges);
        let items: Vec<ContextItem> = traversal
            .nodes
            .iter()
            .filter_map(|node| {
                let path = traversal.path(&node.id);
                let score = weights.path_score(path);
                if query.min_score > 0.0 && score < query.min_score {
                    return None;
                }
                let mut item = ContextItem::new(node.id.clone(), Mode::Graph)
                    .with_content(node.content.clone())
                    .with_source(node.source.clone())
                    .with_score(score)
                    .with_backend(self.graph.name())
                    .with_graph_path(path.to_vec());
                item.metadata = node.metadata.clone();
                Some(item)
            })
            .collect();

        let latency_ms = elapsed_ms(start);
        tracing::debug!(
            starts = start_nodes.len(),
            reached = traversal.nodes.len(),
            kept = items.len(),
            latency_ms,
            "graph retrieval done"
        );
        if let Some(observer) = &self.observer {
            observer.on_graph_traverse(self.graph.name(), depth, items.len(), latency_ms);
        }

        let mut metadata = ResultMetadata {
            total_candidates: traversal.nodes.len(),
            latency_ms,
            ..ResultMetadata::default()
        };
        metadata.modes_used.push(Mode::Graph);

        Ok(RetrievalResult { items, query: query.clone(), metadata })
    }
}
