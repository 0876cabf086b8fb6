//! Reciprocal rank fusion: the rank-based combiner for hybrid keyword +
//! vector search.
//!
//! `fused(c) = Σ over lists L containing c of 1 / (k + rank_L(c) + 1)`,
//! where `rank_L(c)` is zero-based. `k = 60` is fixed, matching the
//! standard RRF constant.

use std::collections::HashMap;
use std::hash::Hash;

pub const RRF_K: f64 = 60.0;

/// Fuses any number of ranked candidate lists (best first) into one
/// ranked-by-fused-score list. Ties are broken by the order items first
/// appear across the input lists, so the result is deterministic for a
/// fixed input.
#[must_use]
pub fn fuse<T: Eq + Hash + Clone>(lists: &[Vec<T>]) -> Vec<(T, f64)> {
    let mut scores: HashMap<T, f64> = HashMap::new();
    let mut first_seen_order: Vec<T> = Vec::new();

    for list in lists {
        for (rank, item) in list.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + rank as f64 + 1.0);
            match scores.get_mut(item) {
                Some(score) => *score += contribution,
                None => {
                    scores.insert(item.clone(), contribution);
                    first_seen_order.push(item.clone());
                }
            }
        }
    }

    let mut fused: Vec<(T, f64)> = first_seen_order
        .into_iter()
        .map(|item| {
            let score = scores[&item];
            (item, score)
        })
        .collect();

    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}
