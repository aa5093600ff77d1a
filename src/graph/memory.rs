//! In-memory knowledge graph.
//!
//! This is the reference implementation of `KnowledgeGraph` and the home of
//! the traversal engine. State sits behind a single `RwLock`, so concurrent
//! traversals proceed in parallel and a traversal always sees a consistent
//! snapshot of nodes and edges.
//!
//! ## Traversal
//!
//! Multi-source BFS, frontier ordered by insertion:
//!
//! 1. Seed the queue with every known start node at depth 0, path `[id]`.
//! 2. Pop the front; skip it if already visited. Mark visited.
//! 3. Apply the node-type filter. A filtered node stays visited and is never
//!    expanded. Otherwise accept it and record its path.
//! 4. At max depth, stop expanding this node.
//! 5. For each followable outgoing edge to an unvisited target, enqueue the
//!    target at depth + 1 and record the edge.
//! 6. The loop ends when the queue drains or `max_nodes` nodes are accepted.
//!
//! The first path to reach a node wins. With BFS that is a shortest path,
//! ties broken by start-node order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use parking_lot::RwLock;
use async_trait::async_trait;

use crate::model::{Metadata, matches_filters};
use crate::{Error, Result};
use super::{GraphEdge, GraphNode, GraphStats, KnowledgeGraph, TraversalOptions, TraversalResult};

// ============================================================================
// MemoryGraph
// ============================================================================

/// In-memory directed knowledge graph. Cloning shares the underlying state.
#[derive(Clone)]
pub struct MemoryGraph {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    name: String,
    state: RwLock<GraphState>,
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<String, GraphNode>,
    /// source node id → outgoing edges, in insertion order
    edges: HashMap<String, Vec<GraphEdge>>,
}

impl MemoryGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                name: name.into(),
                state: RwLock::new(GraphState::default()),
            }),
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.state.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.state.read().edges.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraph")
            .field("name", &self.inner.name)
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

// ============================================================================
// Traversal engine
// ============================================================================

struct Frontier {
    node_id: String,
    path: Vec<String>,
    depth: usize,
}

impl GraphState {
    fn traverse(&self, start_nodes: &[String], opts: &TraversalOptions) -> TraversalResult {
        let mut visited: HashSet<String> = HashSet::new();
        let mut result = TraversalResult::default();

        let mut queue: VecDeque<Frontier> = start_nodes
            .iter()
            .filter(|id| self.nodes.contains_key(id.as_str()))
            .map(|id| Frontier { node_id: id.clone(), path: vec![id.clone()], depth: 0 })
            .collect();

        while result.nodes.len() < opts.max_nodes {
            let Some(current) = queue.pop_front() else { break };

            if !visited.insert(current.node_id.clone()) {
                continue;
            }

            if let Some(node) = self.nodes.get(&current.node_id) {
                if !opts.includes_node(node) {
                    continue;
                }
                result.nodes.push(node.clone());
                result.paths.insert(current.node_id.clone(), current.path.clone());
            }

            if current.depth >= opts.depth {
                continue;
            }

            let Some(outgoing) = self.edges.get(&current.node_id) else { continue };
            for edge in outgoing {
                if !opts.follows_edge(edge) || visited.contains(&edge.to) {
                    continue;
                }
                let mut path = Vec::with_capacity(current.path.len() + 1);
                path.extend_from_slice(&current.path);
                path.push(edge.to.clone());
                queue.push_back(Frontier {
                    node_id: edge.to.clone(),
                    path,
                    depth: current.depth + 1,
                });
                result.edges.push(edge.clone());
            }
        }

        if !queue.is_empty() && result.nodes.len() >= opts.max_nodes {
            tracing::trace!(
                max_nodes = opts.max_nodes,
                pending = queue.len(),
                "traversal stopped at node cap"
            );
        }

        result
    }

    fn remove_edges_to(&mut self, target: &str) {
        for edges in self.edges.values_mut() {
            edges.retain(|e| e.to != target);
        }
    }

    fn check_endpoints(&self, edge: &GraphEdge) -> Result<()> {
        if !self.nodes.contains_key(&edge.from) {
            return Err(Error::NotFound(format!("Source node {}", edge.from)));
        }
        if !self.nodes.contains_key(&edge.to) {
            return Err(Error::NotFound(format!("Target node {}", edge.to)));
        }
        Ok(())
    }
}

// ============================================================================
// KnowledgeGraph impl
// ============================================================================

#[async_trait]
impl KnowledgeGraph for MemoryGraph {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn traverse(
        &self,
        start_nodes: &[String],
        opts: &TraversalOptions,
    ) -> Result<TraversalResult> {
        let result = self.inner.state.read().traverse(start_nodes, opts);
        tracing::debug!(
            graph = %self.inner.name,
            starts = start_nodes.len(),
            reached = result.nodes.len(),
            edges = result.edges.len(),
            "traversal complete"
        );
        Ok(result)
    }

    /// Results are sorted by id so start-node order is stable.
    async fn find_nodes(&self, node_type: &str, filters: &Metadata) -> Result<Vec<GraphNode>> {
        let state = self.inner.state.read();
        let mut found: Vec<GraphNode> = state
            .nodes
            .values()
            .filter(|n| node_type.is_empty() || n.node_type == node_type)
            .filter(|n| matches_filters(&n.metadata, filters))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>> {
        Ok(self.inner.state.read().nodes.get(id).cloned())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.inner.state.read();
        let mut stats = GraphStats {
            name: self.inner.name.clone(),
            node_count: state.nodes.len(),
            ..GraphStats::default()
        };
        for node in state.nodes.values() {
            *stats.node_type_counts.entry(node.node_type.clone()).or_default() += 1;
        }
        for edge in state.edges.values().flatten() {
            stats.edge_count += 1;
            *stats.edge_type_counts.entry(edge.edge_type.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    async fn add_node(&self, node: GraphNode) -> Result<()> {
        let mut state = self.inner.state.write();
        if state.nodes.contains_key(&node.id) {
            return Err(Error::Graph(format!("node {} already exists", node.id)));
        }
        state.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn upsert_node(&self, node: GraphNode) -> Result<()> {
        self.inner.state.write().nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn add_edge(&self, edge: GraphEdge) -> Result<()> {
        let mut state = self.inner.state.write();
        state.check_endpoints(&edge)?;
        state.edges.entry(edge.from.clone()).or_default().push(edge);
        Ok(())
    }

    async fn upsert_edge(&self, edge: GraphEdge) -> Result<()> {
        let mut state = self.inner.state.write();
        state.check_endpoints(&edge)?;
        let outgoing = state.edges.entry(edge.from.clone()).or_default();
        outgoing.retain(|e| e.to != edge.to || e.edge_type != edge.edge_type);
        outgoing.push(edge);
        Ok(())
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        let mut state = self.inner.state.write();
        let removed = state.nodes.remove(id).is_some();
        state.edges.remove(id);
        state.remove_edges_to(id);
        Ok(removed)
    }

    async fn delete_edge(&self, from: &str, to: &str, edge_type: &str) -> Result<bool> {
        let mut state = self.inner.state.write();
        let Some(outgoing) = state.edges.get_mut(from) else { return Ok(false) };
        let before = outgoing.len();
        outgoing.retain(|e| e.to != to || e.edge_type != edge_type);
        Ok(outgoing.len() != before)
    }

    /// Single write lock for the whole batch.
    async fn delete_nodes_batch(&self, ids: &[String]) -> Result<usize> {
        let mut state = self.inner.state.write();
        let mut deleted = 0;
        for id in ids {
            if state.nodes.remove(id).is_some() {
                deleted += 1;
            }
            state.edges.remove(id);
        }
        let gone: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for edges in state.edges.values_mut() {
            edges.retain(|e| !gone.contains(e.to.as_str()));
        }
        Ok(deleted)
    }
}

// ============================================================================
// Tests
// ============================================================================
