//! Score fusion for hybrid results.
//!
//! Semantic scores (`1 - cosine distance`) and lexical scores (`|bm25 rank|`)
//! are not on a shared scale. Fusion keeps whichever entry carries the larger
//! number for a given id; there is no weighted blend.

use std::collections::HashMap;

use super::SearchResult;

/// Collapse duplicate ids, keeping the entry with the strictly higher score.
///
/// The survivor occupies the slot of the id's first appearance, so the input
/// order is what breaks ties in [`rank`].
pub fn merge_by_id(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = Vec::with_capacity(results.len());
    let mut slots: HashMap<i64, usize> = HashMap::with_capacity(results.len());

    for result in results {
        match slots.get(&result.id) {
            Some(&slot) => {
                if result.score > merged[slot].score {
                    merged[slot] = result;
                }
            }
            None => {
                slots.insert(result.id, merged.len());
                merged.push(result);
            }
        }
    }

    merged
}

/// Stable sort by score descending, then truncate to `limit`.
pub fn rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}
