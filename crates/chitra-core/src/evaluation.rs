//! Search quality evaluation helpers.
//!
//! Exhaustive comparison is only feasible at test scale, so the brute-force
//! reference search lives here rather than on the index: callers hand in
//! the vectors they inserted and compare the approximate results against
//! the exact ones.

use chitra_common::{DistanceMetric, Vector, VectorId};

/// Exact top-k by linear scan.
///
/// `vectors` are taken in id order (position = id, matching the index's
/// dense id assignment). Returns `(id, distance)` pairs sorted ascending by
/// distance, ties broken by ascending id.
pub fn exact_top_k(
    vectors: &[Vector],
    query: &[f32],
    k: usize,
    metric: DistanceMetric,
) -> Vec<(VectorId, f32)> {
    let mut scored: Vec<(VectorId, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(id, v)| (id as VectorId, metric.compute(query, v)))
        .collect();

    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

/// Fraction of the exact result set found by the approximate one.
///
/// Returns 0.0 when the exact set is empty, matching the convention that
/// recall is undefined without relevant items.
pub fn recall(approximate: &[VectorId], exact: &[VectorId]) -> f64 {
    if exact.is_empty() {
        return 0.0;
    }

    let found = exact
        .iter()
        .filter(|id| approximate.contains(id))
        .count();
    found as f64 / exact.len() as f64
}
