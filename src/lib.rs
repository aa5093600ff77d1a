//! # hybrid-retrieve: Vector + Graph Retrieval Core
//!
//! Fuses vector similarity search and knowledge-graph traversal into one
//! ranked list of context items.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: the orchestrator sees only `Retriever` / `Reranker`, never a backend
//! 2. **Clean DTOs**: `Query`, `ContextItem`, `RetrievalResult` cross all boundaries
//! 3. **Fail fast**: any backend error aborts the call; empty input is a successful empty answer
//! 4. **Stateless per query**: nothing survives a call except what a `Cache` chooses to keep
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hybrid_retrieve::{
//!     EntityHint, GraphEdge, GraphNode, GraphRetriever, HybridOptions, HybridRetriever,
//!     KnowledgeGraph, MemoryGraph, MemoryVectorIndex, Query, Retriever, VectorIndex,
//!     VectorNode, VectorRetriever,
//! };
//!
//! # async fn example() -> hybrid_retrieve::Result<()> {
//! let graph = MemoryGraph::new("kg");
//! graph.add_node(GraphNode::new("rust", "language").with_content("Rust language")).await?;
//! graph.add_node(GraphNode::new("tokio", "crate").with_content("Async runtime")).await?;
//! graph.add_edge(GraphEdge::new("rust", "tokio", "ecosystem", 0.9)).await?;
//!
//! let index = MemoryVectorIndex::new("docs");
//! index.insert(VectorNode::new("rust", vec![1.0, 0.0]).with_content("Rust language")).await?;
//!
//! let hybrid = HybridRetriever::new(HybridOptions::default())
//!     .with_vector(Arc::new(VectorRetriever::new(Arc::new(index))))
//!     .with_graph(Arc::new(GraphRetriever::new(Arc::new(graph))));
//!
//! let query = Query::new("rust async")
//!     .with_embedding(vec![1.0, 0.1])
//!     .with_entity(EntityHint::from_id("rust"))
//!     .with_top_k(5);
//!
//! for item in hybrid.retrieve(&query).await?.items {
//!     println!("{} {:.3}", item.id, item.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! | Capability | In-memory | Description |
//! |------------|-----------|-------------|
//! | `KnowledgeGraph` | `MemoryGraph` | directed weighted graph with bounded BFS |
//! | `VectorIndex` | `MemoryVectorIndex` | brute-force cosine search |
//! | `Cache` | `MemoryCache` | bounded, query-fingerprint keyed results |
//!
//! ## Logging
//!
//! Everything logs through `tracing`. The crate never installs a subscriber.

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod retrieve;
pub mod graph;
pub mod vector;
pub mod hybrid;
pub mod rerank;
pub mod observe;
pub mod cache;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Query, EntityHint, Mode, ContextItem, Provenance,
    RetrievalResult, ResultMetadata, Metadata,
};

// ============================================================================
// Re-exports: Capabilities
// ============================================================================

pub use retrieve::{Retriever, Reranker, Cache, CachedRetriever};
pub use observe::{Observer, TracingObserver};

// ============================================================================
// Re-exports: Backends and retrievers
// ============================================================================

pub use graph::{
    GraphNode, GraphEdge, TraversalOptions, TraversalResult, GraphStats,
    KnowledgeGraph, MemoryGraph, GraphRetriever,
};
pub use vector::{
    VectorNode, SearchResult, VectorIndex, Embedder,
    MemoryVectorIndex, VectorRetriever,
};
pub use hybrid::{HybridRetriever, HybridOptions, Policy, Weights};
pub use cache::MemoryCache;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Vector index error: {0}")]
    Vector(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
