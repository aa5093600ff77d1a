//! In-memory result cache backed by `moka`.
//!
//! Keys are the JSON serialization of the whole [`Query`], so two queries
//! hit the same entry only when every field matches. Map-typed fields are
//! `BTreeMap`s, which keeps the fingerprint independent of insertion order.
//!
//! Entries are bounded by count (TinyLFU admission and eviction) and may
//! also expire by time-to-live or time-to-idle.

use std::time::Duration;
use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::model::{Query, RetrievalResult};
use crate::retrieve::Cache;
use crate::Result;

pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Stable string key for a query.
pub fn fingerprint(query: &Query) -> Result<String> {
    Ok(serde_json::to_string(query)?)
}

/// Bounded result cache. Clones share storage.
#[derive(Clone)]
pub struct MemoryCache {
    cache: MokaCache<String, RetrievalResult>,
    max_entries: u64,
    time_to_live: Option<Duration>,
    time_to_idle: Option<Duration>,
}

impl MemoryCache {
    /// A cache holding at most `max_entries` results, with no expiry.
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: build(max_entries, None, None),
            max_entries,
            time_to_live: None,
            time_to_idle: None,
        }
    }

    /// Expire entries `ttl` after insertion. Rebuilds the cache empty.
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self.cache = build(self.max_entries, self.time_to_live, self.time_to_idle);
        self
    }

    /// Expire entries not read for `tti`. Rebuilds the cache empty.
    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self.cache = build(self.max_entries, self.time_to_live, self.time_to_idle);
        self
    }

    pub fn max_entries(&self) -> u64 {
        self.max_entries
    }

    /// Approximate entry count. Call [`MemoryCache::run_pending_tasks`]
    /// first for an up-to-date figure.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions and expirations.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Drop the entry for `query`, returning whether one existed.
    pub async fn invalidate(&self, query: &Query) -> bool {
        match fingerprint(query) {
            Ok(key) => self.cache.remove(&key).await.is_some(),
            Err(_) => false,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

fn build(max_entries: u64, ttl: Option<Duration>, tti: Option<Duration>) -> MokaCache<String, RetrievalResult> {
    let mut builder = MokaCache::builder().max_capacity(max_entries);
    if let Some(ttl) = ttl {
        builder = builder.time_to_live(ttl);
    }
    if let Some(tti) = tti {
        builder = builder.time_to_idle(tti);
    }
    builder.build()
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .field("time_to_live", &self.time_to_live)
            .field("time_to_idle", &self.time_to_idle)
            .finish()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, query: &Query) -> Option<RetrievalResult> {
        let key = fingerprint(query).ok()?;
        self.cache.get(&key).await
    }

    async fn put(&self, query: &Query, result: &RetrievalResult) -> Result<()> {
        let key = fingerprint(query)?;
        self.cache.insert(key, result.clone()).await;
        Ok(())
    }
}
