//! Score fusion, deduplication and the final top-K cut.

use hashbrown::HashMap;
use crate::model::{ContextItem, Mode};
use super::Weights;

/// Fuse vector and graph items into one list keyed by item id.
///
/// - Each item's score is multiplied by its source weight.
/// - Duplicate ids inside one source collapse to their best-scoring entry.
/// - An id found by both sources gets the **sum** of both weighted scores,
///   keeps the vector item's fields, and takes the graph path when the graph
///   item has one.
/// - Every output item is re-labelled [`Mode::Hybrid`].
///
/// Output order is first-seen order: vector items, then graph-only items.
pub fn merge_results(
    vector_items: Vec<ContextItem>,
    graph_items: Vec<ContextItem>,
    weights: Weights,
) -> Vec<ContextItem> {
    let vector_items = deduplicate(vector_items);
    let graph_items = deduplicate(graph_items);

    let mut index: HashMap<String, usize> = HashMap::with_capacity(vector_items.len() + graph_items.len());
    let mut merged: Vec<ContextItem> = Vec::with_capacity(vector_items.len() + graph_items.len());

    for mut item in vector_items {
        item.score *= weights.vector;
        index.insert(item.id.clone(), merged.len());
        merged.push(item);
    }

    for mut item in graph_items {
        let weighted = item.score * weights.graph;
        match index.get(&item.id).copied() {
            Some(i) => {
                let existing = &mut merged[i];
                existing.score += weighted;
                if !item.provenance.graph_path.is_empty() {
                    existing.provenance.graph_path = std::mem::take(&mut item.provenance.graph_path);
                }
            }
            None => {
                item.score = weighted;
                index.insert(item.id.clone(), merged.len());
                merged.push(item);
            }
        }
    }

    for item in &mut merged {
        item.provenance.mode = Mode::Hybrid;
    }

    tracing::trace!(merged = merged.len(), "fusion merged");
    merged
}

/// Keep one item per id: the first occurrence, replaced in place whenever a
/// later occurrence scores strictly higher.
pub fn deduplicate(items: Vec<ContextItem>) -> Vec<ContextItem> {
    let total = items.len();
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut out: Vec<ContextItem> = Vec::with_capacity(total);

    for item in items {
        match seen.get(&item.id).copied() {
            Some(i) => {
                if item.score > out[i].score {
                    out[i] = item;
                }
            }
            None => {
                seen.insert(item.id.clone(), out.len());
                out.push(item);
            }
        }
    }
    if out.len() < total {
        tracing::trace!(from = total, to = out.len(), "duplicates collapsed");
    }
    out
}

/// Sort by descending score and keep the first `top_k` (all when 0).
///
/// The sort is stable: equal scores keep their incoming order.
pub fn rank_and_truncate(mut items: Vec<ContextItem>, top_k: usize) -> Vec<ContextItem> {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    if top_k > 0 && items.len() > top_k {
        tracing::trace!(from = items.len(), to = top_k, "truncating");
        items.truncate(top_k);
    }
    items
}
