//! # Knowledge Graph
//!
//! `KnowledgeGraph` is the contract between the graph retriever and any
//! graph store. The graph is directed: edges are stored under their source
//! node and an edge never implies its reverse.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryGraph` | `memory` | In-memory, BFS traversal engine |
//!
//! ## Path scoring
//!
//! A start node scores exactly 1.0. Every hop multiplies the score by
//! `edge_weight * DECAY_FACTOR`, so a node reached over weights
//! `[w1, .., wk]` scores `∏(wi * 0.8)`. A hop whose directed edge weight
//! can't be found (or is zero) counts as `DEFAULT_EDGE_WEIGHT`.

pub mod memory;
pub mod retriever;

use std::collections::{BTreeMap, HashMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::model::Metadata;
use crate::Result;

pub use memory::MemoryGraph;
pub use retriever::GraphRetriever;

/// Per-hop score decay.
pub const DECAY_FACTOR: f64 = 0.8;

/// Weight assumed for a hop whose edge weight is unknown.
pub const DEFAULT_EDGE_WEIGHT: f64 = 0.5;

// ============================================================================
// Nodes and edges
// ============================================================================

/// A node in the knowledge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphNode {
    pub id: String,
    /// e.g. `"concept"`, `"document"`, `"entity"`.
    #[serde(rename = "type")]
    pub node_type: String,
    pub content: String,
    pub source: String,
    pub metadata: Metadata,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
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

/// A directed, typed, weighted edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// e.g. `"relates_to"`, `"part_of"`, `"caused_by"`.
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Weight in [0, 1].
    pub weight: f64,
    pub metadata: Metadata,
}

impl GraphEdge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        edge_type: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type: edge_type.into(),
            weight,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Bounds and filters for a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalOptions {
    /// Maximum hops from any start node.
    pub depth: usize,
    /// Edge types to follow. Empty follows all.
    pub edge_types: Vec<String>,
    /// Node types to include. Empty includes all.
    pub node_types: Vec<String>,
    /// Stop once this many nodes have been accepted.
    pub max_nodes: usize,
    /// Edges lighter than this are not followed.
    pub min_weight: f64,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            edge_types: Vec::new(),
            node_types: Vec::new(),
            max_nodes: 20,
            min_weight: 0.0,
        }
    }
}

impl TraversalOptions {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_min_weight(mut self, min_weight: f64) -> Self {
        self.min_weight = min_weight;
        self
    }

    pub fn with_edge_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.edge_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_node_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.node_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn follows_edge(&self, edge: &GraphEdge) -> bool {
        (self.edge_types.is_empty() || self.edge_types.iter().any(|t| *t == edge.edge_type))
            && edge.weight >= self.min_weight
    }

    pub fn includes_node(&self, node: &GraphNode) -> bool {
        self.node_types.is_empty() || self.node_types.iter().any(|t| *t == node.node_type)
    }
}

/// Nodes reached, edges followed, and the path that first reached each node.
///
/// Every node in `nodes` has exactly one entry in `paths`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub paths: HashMap<String, Vec<String>>,
}

impl TraversalResult {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn path(&self, node_id: &str) -> &[String] {
        self.paths.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Score every reached node, in `nodes` order.
    pub fn scores(&self) -> Vec<(&GraphNode, f64)> {
        let weights = EdgeWeights::from_edges(&self.edges);
        self.nodes
            .iter()
            .map(|n| (n, weights.path_score(self.path(&n.id))))
            .collect()
    }
}

/// Directed `(from, to) → weight` lookup over traversed edges.
#[derive(Debug, Default)]
pub struct EdgeWeights<'a> {
    weights: HashMap<(&'a str, &'a str), f64>,
}

impl<'a> EdgeWeights<'a> {
    pub fn from_edges(edges: &'a [GraphEdge]) -> Self {
        let weights = edges
            .iter()
            .map(|e| ((e.from.as_str(), e.to.as_str()), e.weight))
            .collect();
        Self { weights }
    }

    /// Weight of the hop `from → to`; unknown or zero reads as the default.
    pub fn hop_weight(&self, from: &str, to: &str) -> f64 {
        match self.weights.get(&(from, to)) {
            Some(&w) if w != 0.0 => w,
            _ => DEFAULT_EDGE_WEIGHT,
        }
    }

    /// Decayed score for a path of node ids. Paths of zero or one node score 1.0.
    pub fn path_score(&self, path: &[String]) -> f64 {
        path.windows(2)
            .map(|hop| self.hop_weight(&hop[0], &hop[1]) * DECAY_FACTOR)
            .product()
    }
}

/// Convenience for scoring a single path.
pub fn path_score(path: &[String], edges: &[GraphEdge]) -> f64 {
    EdgeWeights::from_edges(edges).path_score(path)
}

/// Node and edge counts, overall and per type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub node_type_counts: BTreeMap<String, usize>,
    pub edge_type_counts: BTreeMap<String, usize>,
}

// ============================================================================
// KnowledgeGraph Trait
// ============================================================================

/// The graph store contract.
///
/// Implementations must tolerate concurrent reads: the hybrid orchestrator
/// may traverse while a vector search is in flight on another branch.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync + 'static {
    /// Name reported in provenance and observer events.
    fn name(&self) -> &str;

    // ========================================================================
    // Read
    // ========================================================================

    /// Multi-source traversal from `start_nodes`.
    ///
    /// Unknown start ids are ignored; an empty or all-unknown start set
    /// yields an empty result, not an error.
    async fn traverse(
        &self,
        start_nodes: &[String],
        opts: &TraversalOptions,
    ) -> Result<TraversalResult>;

    /// Nodes of `node_type` (empty matches any) whose metadata matches `filters`.
    async fn find_nodes(&self, node_type: &str, filters: &Metadata) -> Result<Vec<GraphNode>>;

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>>;

    async fn stats(&self) -> Result<GraphStats>;

    // ========================================================================
    // Write
    // ========================================================================

    /// Insert a new node. Fails if the id is taken.
    async fn add_node(&self, node: GraphNode) -> Result<()>;

    /// Insert or replace a node.
    async fn upsert_node(&self, node: GraphNode) -> Result<()>;

    /// Append an edge. Both endpoints must exist.
    async fn add_edge(&self, edge: GraphEdge) -> Result<()>;

    /// Insert an edge, replacing any edge with the same `(from, to, type)`.
    async fn upsert_edge(&self, edge: GraphEdge) -> Result<()>;

    /// Delete a node with its outgoing and incoming edges. Returns true if it existed.
    async fn delete_node(&self, id: &str) -> Result<bool>;

    /// Delete edges matching `(from, to, type)`. Returns true if any existed.
    async fn delete_edge(&self, from: &str, to: &str, edge_type: &str) -> Result<bool>;

    // ========================================================================
    // Batch operations
    // ========================================================================

    /// Default falls back to sequential `add_node` calls.
    async fn add_nodes_batch(&self, nodes: Vec<GraphNode>) -> Result<()> {
        for node in nodes {
            self.add_node(node).await?;
        }
        Ok(())
    }

    /// Default falls back to sequential `upsert_node` calls.
    async fn upsert_nodes_batch(&self, nodes: Vec<GraphNode>) -> Result<()> {
        for node in nodes {
            self.upsert_node(node).await?;
        }
        Ok(())
    }

    /// Default falls back to sequential `add_edge` calls.
    async fn add_edges_batch(&self, edges: Vec<GraphEdge>) -> Result<()> {
        for edge in edges {
            self.add_edge(edge).await?;
        }
        Ok(())
    }

    /// Default falls back to sequential `upsert_edge` calls.
    async fn upsert_edges_batch(&self, edges: Vec<GraphEdge>) -> Result<()> {
        for edge in edges {
            self.upsert_edge(edge).await?;
        }
        Ok(())
    }

    /// Default falls back to sequential `delete_node` calls.
    async fn delete_nodes_batch(&self, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete_node(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_start_node_scores_one() {
        assert_eq!(path_score(&ids(&["a"]), &[]), 1.0);
        assert_eq!(path_score(&[], &[]), 1.0);
    }

    #[test]
    fn test_path_score_decays_per_hop() {
        let edges = vec![
            GraphEdge::new("a", "b", "rel", 0.9),
            GraphEdge::new("b", "c", "rel", 0.8),
        ];
        let b = path_score(&ids(&["a", "b"]), &edges);
        let c = path_score(&ids(&["a", "b", "c"]), &edges);
        assert!((b - 0.72).abs() < 1e-12);
        assert!((c - 0.4608).abs() < 1e-12);
    }

    #[test]
    fn test_missing_or_zero_weight_uses_default() {
        let edges = vec![GraphEdge::new("a", "b", "rel", 0.0)];
        assert!((path_score(&ids(&["a", "b"]), &edges) - 0.4).abs() < 1e-12);
        // Edges are directed: b→a is unknown.
        assert!((path_score(&ids(&["b", "a"]), &[GraphEdge::new("a", "b", "rel", 0.9)]) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_options_filters() {
        let opts = TraversalOptions::default()
            .with_edge_types(["part_of"])
            .with_node_types(["concept"])
            .with_min_weight(0.5);
        assert!(opts.follows_edge(&GraphEdge::new("a", "b", "part_of", 0.5)));
        assert!(!opts.follows_edge(&GraphEdge::new("a", "b", "part_of", 0.49)));
        assert!(!opts.follows_edge(&GraphEdge::new("a", "b", "cites", 0.9)));
        assert!(opts.includes_node(&GraphNode::new("a", "concept")));
        assert!(!opts.includes_node(&GraphNode::new("a", "document")));
    }
}
