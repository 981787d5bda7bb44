use ahash::AHashSet;
use std::cmp::Ordering;

/// Descending by score, ascending by index on ties.
#[inline]
fn by_score_desc(scores: &[f32], a: usize, b: usize) -> Ordering {
    scores[b].total_cmp(&scores[a]).then(a.cmp(&b))
}

/// All indices of `scores`, best first.
pub(crate) fn argsort_desc(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_unstable_by(|&a, &b| by_score_desc(scores, a, b));
    order
}

/// Order indices by score, optionally restricted to `candidates`.
///
/// Candidates past the end of `scores` are scored with `pad`, so they rank
/// alongside the catalog instead of being dropped. The result keeps the
/// global sort order and lists each candidate once.
pub(crate) fn rank_by_scores(scores: &[f32], candidates: Option<&[usize]>, pad: f32) -> Vec<usize> {
    let Some(candidates) = candidates else {
        return argsort_desc(scores);
    };
    let score_of = |i: usize| scores.get(i).copied().unwrap_or(pad);
    let mut seen = AHashSet::with_capacity(candidates.len());
    let mut ranked: Vec<(usize, f32)> = candidates
        .iter()
        .filter(|&&i| seen.insert(i))
        .map(|&i| (i, score_of(i)))
        .collect();
    ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(i, _)| i).collect()
}

/// Best `n` `(index, score)` pairs, skipping `excluded`.
pub(crate) fn top_n(scores: &[f32], n: usize, excluded: &AHashSet<usize>) -> Vec<(usize, f32)> {
    let mut ids: Vec<usize> = (0..scores.len()).filter(|i| !excluded.contains(i)).collect();
    let take = n.min(ids.len());
    if take == 0 {
        return vec![];
    }
    if take < ids.len() {
        ids.select_nth_unstable_by(take - 1, |&a, &b| by_score_desc(scores, a, b));
        ids.truncate(take);
    }
    ids.sort_unstable_by(|&a, &b| by_score_desc(scores, a, b));
    ids.into_iter().map(|i| (i, scores[i])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_break_by_ascending_index() {
        assert_eq!(argsort_desc(&[1.0, 3.0, 1.0, 3.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn candidates_keep_global_order() {
        let scores = vec![0.1, 0.9, 0.5, 0.7];
        assert_eq!(rank_by_scores(&scores, None, 0.0), vec![1, 3, 2, 0]);
        assert_eq!(rank_by_scores(&scores, Some(&[0, 2, 1]), 0.0), vec![1, 2, 0]);
        assert_eq!(rank_by_scores(&scores, Some(&[2, 2, 0]), 0.0), vec![2, 0]);
        assert!(rank_by_scores(&scores, Some(&[]), 0.0).is_empty());
    }

    #[test]
    fn out_of_catalog_candidates_are_padded() {
        let scores = vec![2.0, 5.0, 3.0];
        assert_eq!(rank_by_scores(&scores, Some(&[5, 0, 1]), 1.0), vec![1, 0, 5]);
        // pad ties with an in-catalog score break by index
        assert_eq!(rank_by_scores(&scores, Some(&[4, 2, 3]), 3.0), vec![2, 3, 4]);
    }

    #[test]
    fn huge_candidate_ids_do_not_grow_the_score_vector() {
        let scores = vec![2.0, 5.0, 3.0];
        assert_eq!(rank_by_scores(&scores, Some(&[0, usize::MAX]), 1.0), vec![0, usize::MAX]);
        assert_eq!(
            rank_by_scores(&scores, Some(&[1, 10_000_000_000, 0]), 2.5),
            vec![1, 10_000_000_000, 0]
        );
        assert_eq!(
            rank_by_scores(&scores, Some(&[usize::MAX, usize::MAX - 1, 2]), 0.0),
            vec![2, usize::MAX - 1, usize::MAX]
        );
    }

    #[test]
    fn top_n_skips_excluded_and_sorts() {
        let scores = [0.3, 0.8, 0.1, 0.8, 0.5];
        let excluded: AHashSet<usize> = [3].into_iter().collect();
        assert_eq!(top_n(&scores, 2, &excluded), vec![(1, 0.8), (4, 0.5)]);
        assert_eq!(top_n(&scores, 10, &AHashSet::new()).len(), 5);
        assert!(top_n(&scores, 0, &AHashSet::new()).is_empty());
    }
}
