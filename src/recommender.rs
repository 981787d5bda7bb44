use crate::dataset::Dataset;
use crate::error::Result;
use crate::progress::FitReport;

/// Lifecycle shared by trainable recommenders.
pub trait Recommender {
    fn name(&self) -> &str;

    /// Train from scratch, replacing any previous state.
    fn fit(&mut self, dataset: &dyn Dataset) -> FitReport;

    fn is_fitted(&self) -> bool;

    /// Estimated preference of `user` for `item`.
    fn score(&self, user: usize, item: usize) -> Result<f32>;

    /// Items ordered by descending estimated preference, optionally limited
    /// to `candidates`.
    fn rank(&self, user: usize, candidates: Option<&[usize]>) -> Result<Vec<usize>>;
}
