use crate::dataset::Interactions;
use crate::ranking::rank_by_scores;

/// Ranking used when a user has no usable signal at all.
pub trait FallbackRanker: Send + Sync {
    fn rank(&self, candidates: Option<&[usize]>) -> Vec<usize>;
}

/// Most-interacted items first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopularityRanker {
    counts: Vec<f32>,
}

impl PopularityRanker {
    pub fn from_interactions(interactions: &Interactions) -> Self {
        Self {
            counts: interactions.item_counts().into_iter().map(|c| c as f32).collect(),
        }
    }

    /// No popularity information: catalog order.
    pub fn uniform(num_items: usize) -> Self {
        Self { counts: vec![0.0; num_items] }
    }
}

impl FallbackRanker for PopularityRanker {
    fn rank(&self, candidates: Option<&[usize]>) -> Vec<usize> {
        rank_by_scores(&self.counts, candidates, 0.0)
    }
}
