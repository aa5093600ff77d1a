//! # Retrieval Model
//!
//! Clean DTOs that cross every boundary: retriever ↔ orchestrator ↔ reranker ↔ caller.
//!
//! Design rule: NO backend types here. This module is pure data: no I/O,
//! no state, no async. Everything is created per query and dropped once the
//! caller has consumed the [`RetrievalResult`].

pub mod query;
pub mod item;
pub mod result;
pub mod metadata;

pub use query::{Query, EntityHint, Mode};
pub use item::{ContextItem, Provenance};
pub use result::{RetrievalResult, ResultMetadata, ModeSet};
pub use metadata::{Metadata, matches_filters};
