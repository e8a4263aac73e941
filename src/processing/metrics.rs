//! Offline relevance metrics for evaluating ranked similarity results.

use std::collections::HashSet;

/// Fraction of the top `k` predictions that are relevant.
pub fn precision_at_k(relevant: &HashSet<u64>, predicted: &[u64], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .take(k)
        .filter(|id| relevant.contains(id))
        .count();
    hits as f64 / k as f64
}

/// Fraction of the relevant items recovered in the top `k` predictions.
pub fn recall_at_k(relevant: &HashSet<u64>, predicted: &[u64], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .take(k)
        .filter(|id| relevant.contains(id))
        .count();
    hits as f64 / relevant.len() as f64
}

/// Mean average precision over the full prediction list.
pub fn mean_average_precision(relevant: &HashSet<u64>, predicted: &[u64]) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (position, id) in predicted.iter().enumerate() {
        if relevant.contains(id) {
            hits += 1;
            sum += hits as f64 / (position + 1) as f64;
        }
    }
    sum / relevant.len() as f64
}
