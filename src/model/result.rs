//! RetrievalResult: the ranked answer to a [`Query`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use super::{ContextItem, Mode, Query};

/// Modes used by one call. At most three exist, so this never spills.
pub type ModeSet = SmallVec<[Mode; 3]>;

/// Response metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Candidates seen before filtering and truncation.
    pub total_candidates: usize,
    pub latency_ms: u64,
    /// Modes actually executed, not merely configured.
    pub modes_used: ModeSet,
    pub cache_hit: bool,
}

/// Items ordered by descending score, with the query that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub items: Vec<ContextItem>,
    pub query: Query,
    pub metadata: ResultMetadata,
}

impl RetrievalResult {
    /// A successful, empty answer.
    pub fn empty(query: Query, mode: Mode) -> Self {
        let mut metadata = ResultMetadata::default();
        metadata.modes_used.push(mode);
        Self { items: Vec::new(), query, metadata }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    pub fn used(&self, mode: Mode) -> bool {
        self.metadata.modes_used.contains(&mode)
    }
}
