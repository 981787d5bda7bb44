//! Ranking quality at a cutoff `k`.
//!
//! `actual` holds the relevant items, `predicted` a ranking best-first. Every
//! metric is 0 when `actual` is empty, `k` is 0 or nothing was predicted.

use std::collections::HashSet;

/// Relevant items among the first `k` predictions.
fn hits_in_top_k(actual: &HashSet<usize>, predicted: &[usize], k: usize) -> usize {
    predicted.iter().take(k).filter(|&i| actual.contains(i)).count()
}

fn relevant(actual: &[usize], predicted: &[usize], k: usize) -> Option<HashSet<usize>> {
    if actual.is_empty() || k == 0 || predicted.is_empty() {
        return None;
    }
    Some(actual.iter().copied().collect())
}

pub fn precision_at_k(actual: &[usize], predicted: &[usize], k: usize) -> f32 {
    match relevant(actual, predicted, k) {
        Some(set) => hits_in_top_k(&set, predicted, k) as f32 / k as f32,
        None => 0.0,
    }
}

pub fn recall_at_k(actual: &[usize], predicted: &[usize], k: usize) -> f32 {
    match relevant(actual, predicted, k) {
        Some(set) => hits_in_top_k(&set, predicted, k) as f32 / set.len() as f32,
        None => 0.0,
    }
}

pub fn hit_rate_at_k(actual: &[usize], predicted: &[usize], k: usize) -> f32 {
    match relevant(actual, predicted, k) {
        Some(set) if hits_in_top_k(&set, predicted, k) > 0 => 1.0,
        _ => 0.0,
    }
}

pub fn ndcg_at_k(actual: &[usize], predicted: &[usize], k: usize) -> f32 {
    let Some(set) = relevant(actual, predicted, k) else {
        return 0.0;
    };
    let k_actual = k.min(predicted.len());
    let dcg: f32 = predicted[..k_actual]
        .iter()
        .enumerate()
        .filter(|&(_, i)| set.contains(i))
        .map(|(pos, _)| 1.0 / (2.0 + pos as f32).log2())
        .sum();
    let idcg: f32 = (0..k_actual.min(set.len()))
        .map(|pos| 1.0 / (2.0 + pos as f32).log2())
        .sum();
    if idcg == 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}
