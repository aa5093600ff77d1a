//! # Rerankers
//!
//! Post-fusion rescoring. Every reranker writes the score it assigned to
//! `provenance.reranker_score`.
//!
//! | Reranker | Scoring |
//! |----------|---------|
//! | [`Heuristic`] | position and score heuristics, optional exact-match boost |
//! | [`CrossEncoder`] | external query/document scorer replaces the score |
//! | [`Chain`] | applies rerankers in order, stops at the first error |

use std::str::FromStr;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ContextItem, Query};
use crate::retrieve::Reranker;
use crate::{Error, Result};

/// Rank offset used by reciprocal rank fusion.
pub const RRF_K: f64 = 60.0;

pub const DEFAULT_EXACT_MATCH_BOOST: f64 = 1.5;

fn sort_desc(items: &mut [ContextItem]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn truncate(items: &mut Vec<ContextItem>, top_k: usize) {
    if top_k > 0 {
        items.truncate(top_k);
    }
}

// ============================================================================
// Heuristic
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Keep the incoming score.
    #[default]
    Linear,
    /// Keep the incoming score.
    Max,
    /// `1 / (rank + 60) + 0.5 * score`, rank being the incoming position.
    Reciprocal,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Strategy::Linear),
            "max" => Ok(Strategy::Max),
            "reciprocal" => Ok(Strategy::Reciprocal),
            other => Err(Error::InvalidConfig(format!("unknown rerank strategy '{other}'"))),
        }
    }
}

/// Scores items without a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristic {
    pub strategy: Strategy,
    pub top_k: usize,
    pub min_score: f64,
    pub boost_exact_match: bool,
    pub exact_match_boost: f64,
}

impl Default for Heuristic {
    fn default() -> Self {
        Self {
            strategy: Strategy::Linear,
            top_k: 0,
            min_score: 0.0,
            boost_exact_match: false,
            exact_match_boost: DEFAULT_EXACT_MATCH_BOOST,
        }
    }
}

impl Heuristic {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy, ..Self::default() }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_min_score(mut self, min: f64) -> Self {
        self.min_score = min;
        self
    }

    /// Multiply the score of items whose content contains the query text
    /// (case-insensitive). A zero factor keeps the default.
    pub fn with_exact_match_boost(mut self, factor: f64) -> Self {
        self.boost_exact_match = true;
        if factor != 0.0 {
            self.exact_match_boost = factor;
        }
        self
    }

    /// Zero reads as [`DEFAULT_EXACT_MATCH_BOOST`], whichever way the config was built.
    fn boost_factor(&self) -> f64 {
        if self.exact_match_boost == 0.0 {
            DEFAULT_EXACT_MATCH_BOOST
        } else {
            self.exact_match_boost
        }
    }

    fn score(&self, rank: usize, item: &ContextItem, needle: &str) -> f64 {
        let mut score = match self.strategy {
            Strategy::Reciprocal => 1.0 / (rank as f64 + RRF_K) + item.score * 0.5,
            Strategy::Linear | Strategy::Max => item.score,
        };
        if self.boost_exact_match && item.content.to_lowercase().contains(needle) {
            score *= self.boost_factor();
        }
        score
    }
}

#[async_trait]
impl Reranker for Heuristic {
    async fn rerank(&self, query: &Query, mut items: Vec<ContextItem>) -> Result<Vec<ContextItem>> {
        if items.is_empty() {
            return Ok(items);
        }
        let needle = query.text.to_lowercase();

        for (rank, item) in items.iter_mut().enumerate() {
            let score = self.score(rank, item, &needle);
            item.score = score;
            item.provenance.reranker_score = score;
        }

        sort_desc(&mut items);
        if self.min_score > 0.0 {
            items.retain(|i| i.score >= self.min_score);
        }
        truncate(&mut items, self.top_k);
        Ok(items)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

// ============================================================================
// CrossEncoder
// ============================================================================

/// Scores query/document pairs, one score per document in input order.
#[async_trait]
pub trait CrossEncoderScorer: Send + Sync {
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f64>>;

    fn model(&self) -> &str;
}

/// Replaces fused scores with a cross-encoder's relevance scores.
pub struct CrossEncoder {
    scorer: Arc<dyn CrossEncoderScorer>,
    top_k: usize,
    min_score: f64,
}

impl CrossEncoder {
    pub fn new(scorer: Arc<dyn CrossEncoderScorer>) -> Self {
        Self { scorer, top_k: 0, min_score: 0.0 }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_min_score(mut self, min: f64) -> Self {
        self.min_score = min;
        self
    }
}

#[async_trait]
impl Reranker for CrossEncoder {
    async fn rerank(&self, query: &Query, items: Vec<ContextItem>) -> Result<Vec<ContextItem>> {
        if items.is_empty() {
            return Ok(items);
        }

        let scores = {
            let docs: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
            self.scorer.score(&query.text, &docs).await?
        };
        if scores.len() != items.len() {
            tracing::warn!(
                model = self.scorer.model(),
                expected = items.len(),
                got = scores.len(),
                "scorer returned a short score list"
            );
        }

        // Items past the end of a short score list keep their fused score.
        let mut out: Vec<ContextItem> = items
            .into_iter()
            .enumerate()
            .map(|(i, mut item)| {
                if let Some(&s) = scores.get(i) {
                    item.score = s;
                    item.provenance.reranker_score = s;
                }
                item
            })
            .filter(|item| item.score >= self.min_score)
            .collect();

        sort_desc(&mut out);
        truncate(&mut out, self.top_k);
        Ok(out)
    }

    fn name(&self) -> &str {
        self.scorer.model()
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Runs rerankers in sequence.
#[derive(Default)]
pub struct Chain {
    rerankers: Vec<Arc<dyn Reranker>>,
}

impl Chain {
    pub fn new(rerankers: Vec<Arc<dyn Reranker>>) -> Self {
        Self { rerankers }
    }

    pub fn then(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.rerankers.push(reranker);
        self
    }

    pub fn len(&self) -> usize {
        self.rerankers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rerankers.is_empty()
    }
}

#[async_trait]
impl Reranker for Chain {
    async fn rerank(&self, query: &Query, mut items: Vec<ContextItem>) -> Result<Vec<ContextItem>> {
        for r in &self.rerankers {
            items = r.rerank(query, items).await?;
        }
        Ok(items)
    }

    fn name(&self) -> &str {
        "chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mode;
    use pretty_assertions::assert_eq;

    fn items() -> Vec<ContextItem> {
        [
            ("1", "Machine learning is a subset of AI", 0.8),
            ("2", "Deep learning uses neural networks", 0.7),
            ("3", "Natural language processing basics", 0.6),
            ("4", "Computer vision applications", 0.5),
        ]
        .into_iter()
        .map(|(id, content, score)| ContextItem::new(id, Mode::Hybrid).with_content(content).with_score(score))
        .collect()
    }

    fn ids(items: &[ContextItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_heuristic_exact_match_boost() {
        let r = Heuristic::new(Strategy::Linear).with_top_k(3).with_exact_match_boost(2.0);
        let mut input = items();
        input.reverse();

        let out = r.rerank(&Query::new("MACHINE learning"), input).await.unwrap();
        assert_eq!(ids(&out), vec!["1", "2", "3"]);
        assert!((out[0].score - 1.6).abs() < 1e-12);
        assert_eq!(out[0].provenance.reranker_score, out[0].score);
    }

    #[tokio::test]
    async fn test_heuristic_default_boost_factor() {
        let r = Heuristic::new(Strategy::Max).with_exact_match_boost(0.0);
        assert_eq!(r.exact_match_boost, DEFAULT_EXACT_MATCH_BOOST);

        let out = r.rerank(&Query::new("vision"), items()).await.unwrap();
        let vision = out.iter().find(|i| i.id == "4").unwrap();
        assert!((vision.score - 0.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_heuristic_zero_boost_from_json_uses_default() {
        let r: Heuristic = serde_json::from_str(
            r#"{"strategy": "linear", "boost_exact_match": true, "exact_match_boost": 0}"#,
        )
        .unwrap();
        assert_eq!(r.exact_match_boost, 0.0);

        let out = r.rerank(&Query::new("vision"), items()).await.unwrap();
        let vision = out.iter().find(|i| i.id == "4").unwrap();
        assert!((vision.score - 0.75).abs() < 1e-12);
        assert_eq!(ids(&out)[0], "1");
    }

    #[tokio::test]
    async fn test_heuristic_reciprocal() {
        let r = Heuristic::new(Strategy::Reciprocal);
        let out = r.rerank(&Query::new("neural networks"), items()).await.unwrap();

        assert_eq!(ids(&out), vec!["1", "2", "3", "4"]);
        assert!((out[0].score - (1.0 / 60.0 + 0.4)).abs() < 1e-12);
        assert!((out[3].score - (1.0 / 63.0 + 0.25)).abs() < 1e-12);
        assert!(out.iter().all(|i| i.provenance.reranker_score > 0.0));
    }

    #[tokio::test]
    async fn test_heuristic_min_score() {
        let r = Heuristic::new(Strategy::Linear).with_min_score(0.65);
        let out = r.rerank(&Query::new("test"), items()).await.unwrap();
        assert_eq!(ids(&out), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_heuristic_empty_input() {
        let out = Heuristic::default().rerank(&Query::new("x"), Vec::new()).await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("reciprocal".parse::<Strategy>().unwrap(), Strategy::Reciprocal);
        assert!(matches!("rrf".parse::<Strategy>(), Err(Error::InvalidConfig(_))));
    }

    /// Scores documents by position, last highest, or fails.
    struct PositionScorer {
        fail: bool,
    }

    #[async_trait]
    impl CrossEncoderScorer for PositionScorer {
        async fn score(&self, _query: &str, documents: &[&str]) -> Result<Vec<f64>> {
            if self.fail {
                return Err(Error::Rerank("scorer offline".into()));
            }
            Ok((1..=documents.len()).map(|i| i as f64 / 10.0).collect())
        }

        fn model(&self) -> &str {
            "position-v1"
        }
    }

    #[tokio::test]
    async fn test_cross_encoder_replaces_scores() {
        let r = CrossEncoder::new(Arc::new(PositionScorer { fail: false })).with_min_score(0.15).with_top_k(2);
        assert_eq!(r.name(), "position-v1");

        let out = r.rerank(&Query::new("q"), items()).await.unwrap();
        assert_eq!(ids(&out), vec!["4", "3"]);
        assert!((out[0].score - 0.4).abs() < 1e-12);
        assert_eq!(out[0].provenance.reranker_score, out[0].score);
    }

    #[tokio::test]
    async fn test_cross_encoder_error() {
        let r = CrossEncoder::new(Arc::new(PositionScorer { fail: true }));
        assert!(matches!(r.rerank(&Query::new("q"), items()).await, Err(Error::Rerank(_))));
    }

    struct Broken;

    #[async_trait]
    impl Reranker for Broken {
        async fn rerank(&self, _query: &Query, _items: Vec<ContextItem>) -> Result<Vec<ContextItem>> {
            Err(Error::Rerank("broken".into()))
        }
    }

    #[tokio::test]
    async fn test_chain_applies_in_order() {
        let chain = Chain::default()
            .then(Arc::new(Heuristic::new(Strategy::Linear).with_exact_match_boost(2.0)))
            .then(Arc::new(Heuristic::default().with_top_k(1)));
        assert_eq!(chain.len(), 2);

        let out = chain.rerank(&Query::new("vision"), items()).await.unwrap();
        assert_eq!(ids(&out), vec!["4"]);
        assert!((out[0].score - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_chain_fails_fast() {
        let chain = Chain::new(vec![Arc::new(Broken), Arc::new(Heuristic::default())]);
        assert!(chain.rerank(&Query::new("q"), items()).await.is_err());
        assert_eq!(chain.name(), "chain");
    }
}
