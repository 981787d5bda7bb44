// Matrix factorization trained by plain SGD.
//
// r̂_ui = P_u · Q_i                      (no bias)
// r̂_ui = μ + b_u + b_i + P_u · Q_i      (bias)

use std::io::{Read, Write};
use std::sync::Arc;

use ahash::AHashSet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MfConfig;
use crate::dataset::{Dataset, Interactions};
use crate::error::{MfError, Result};
use crate::fallback::{FallbackRanker, PopularityRanker};
use crate::linalg::{catalog_scores, dot, normal_factors, update_factors};
use crate::progress::{FitReport, NoProgress, Progress, TracingProgress};
use crate::ranking::{rank_by_scores, top_n};
use crate::recommender::Recommender;

/// Early stopping fires once consecutive epoch losses differ by less than this.
pub const EARLY_STOP_TOLERANCE: f64 = 1e-5;

/// Bias terms of a fitted model; absent entirely when bias mode is off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Biases {
    WithBias {
        global_mean: f32,
        user_bias: Vec<f32>,
        item_bias: Vec<f32>,
    },
    NoBias,
}

/// Everything a fitted model needs for inference.
///
/// Factor matrices are row-major: row `u` of `user_factors` is
/// `user_factors[u * k..(u + 1) * k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    pub k: usize,
    pub num_users: usize,
    pub num_items: usize,
    pub user_factors: Vec<f32>,
    pub item_factors: Vec<f32>,
    pub biases: Biases,
    /// Score given to out-of-catalog ranking candidates.
    pub min_rating: f32,
    /// In-range users the training data reported as unknown, ascending.
    #[serde(default)]
    pub unknown_users: Vec<usize>,
    /// In-range items the training data reported as unknown, ascending.
    #[serde(default)]
    pub unknown_items: Vec<usize>,
}

impl FittedParams {
    pub fn user_vector(&self, user: usize) -> &[f32] {
        &self.user_factors[user * self.k..(user + 1) * self.k]
    }

    pub fn item_vector(&self, item: usize) -> &[f32] {
        &self.item_factors[item * self.k..(item + 1) * self.k]
    }

    pub fn is_known_user(&self, user: usize) -> bool {
        user < self.num_users && self.unknown_users.binary_search(&user).is_err()
    }

    pub fn is_known_item(&self, item: usize) -> bool {
        item < self.num_items && self.unknown_items.binary_search(&item).is_err()
    }

    fn check_shapes(&self) -> Result<()> {
        if self.user_factors.len() != self.num_users * self.k {
            return Err(MfError::ShapeMismatch(format!(
                "user_factors has {} values, expected {} x {}",
                self.user_factors.len(),
                self.num_users,
                self.k
            )));
        }
        if self.item_factors.len() != self.num_items * self.k {
            return Err(MfError::ShapeMismatch(format!(
                "item_factors has {} values, expected {} x {}",
                self.item_factors.len(),
                self.num_items,
                self.k
            )));
        }
        for (what, ids, bound) in [
            ("unknown_users", &self.unknown_users, self.num_users),
            ("unknown_items", &self.unknown_items, self.num_items),
        ] {
            let ascending = ids.windows(2).all(|w| w[0] < w[1]);
            if !ascending || ids.last().is_some_and(|&id| id >= bound) {
                return Err(MfError::ShapeMismatch(format!(
                    "{what} must be strictly ascending ids below {bound}"
                )));
            }
        }
        if let Biases::WithBias { user_bias, item_bias, .. } = &self.biases {
            if user_bias.len() != self.num_users || item_bias.len() != self.num_items {
                return Err(MfError::ShapeMismatch(format!(
                    "bias lengths {}/{} do not match {} users / {} items",
                    user_bias.len(),
                    item_bias.len(),
                    self.num_users,
                    self.num_items
                )));
            }
        }
        Ok(())
    }
}

struct Trained {
    params: FittedParams,
    popularity: PopularityRanker,
}

/// Latent-factor recommender fitted with stochastic gradient descent.
pub struct MatrixFactorization {
    config: MfConfig,
    fallback: Option<Arc<dyn FallbackRanker>>,
    state: Option<Trained>,
}

impl std::fmt::Debug for MatrixFactorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixFactorization")
            .field("config", &self.config)
            .field("custom_fallback", &self.fallback.is_some())
            .field("fitted", &self.state.is_some())
            .finish()
    }
}

impl MatrixFactorization {
    pub fn new(config: MfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, fallback: None, state: None })
    }

    /// Rebuild a fitted model from exported parameters.
    pub fn from_params(config: MfConfig, params: FittedParams) -> Result<Self> {
        config.validate()?;
        if params.k != config.k {
            return Err(MfError::ShapeMismatch(format!(
                "parameters have k = {}, configuration has k = {}",
                params.k, config.k
            )));
        }
        let has_bias = matches!(params.biases, Biases::WithBias { .. });
        if has_bias != config.use_bias {
            return Err(MfError::ShapeMismatch(format!(
                "parameters {} bias terms but use_bias = {}",
                if has_bias { "carry" } else { "lack" },
                config.use_bias
            )));
        }
        params.check_shapes()?;
        let popularity = PopularityRanker::uniform(params.num_items);
        Ok(Self {
            config,
            fallback: None,
            state: Some(Trained { params, popularity }),
        })
    }

    /// Ranking used for unknown users when bias mode is off. Without one the
    /// model ranks by training-set popularity.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackRanker>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn config(&self) -> &MfConfig {
        &self.config
    }

    pub fn params(&self) -> Option<&FittedParams> {
        self.state.as_ref().map(|s| &s.params)
    }

    fn trained(&self) -> Result<&Trained> {
        self.state.as_ref().ok_or(MfError::UntrainedModel)
    }

    pub fn fit(&mut self, dataset: &dyn Dataset) -> FitReport {
        if self.config.verbose {
            let mut progress = TracingProgress::new(self.config.name.clone());
            self.fit_with_progress(dataset, &mut progress)
        } else {
            self.fit_with_progress(dataset, &mut NoProgress)
        }
    }

    /// Train from scratch, reporting each epoch to `progress`.
    ///
    /// The new parameters replace the old ones only after the last epoch.
    pub fn fit_with_progress(&mut self, dataset: &dyn Dataset, progress: &mut dyn Progress) -> FitReport {
        let (params, report) = sgd_train(dataset, &self.config, progress);
        let popularity = PopularityRanker::from_interactions(dataset.interactions());
        self.state = Some(Trained { params, popularity });
        progress.on_finish(&report);
        report
    }

    pub fn score(&self, user: usize, item: usize) -> Result<f32> {
        let params = &self.trained()?.params;
        let user_known = params.is_known_user(user);
        let item_known = params.is_known_item(item);
        match &params.biases {
            Biases::WithBias { global_mean, user_bias, item_bias } => {
                let mut estimate = *global_mean;
                if user_known {
                    estimate += user_bias[user];
                }
                if item_known {
                    estimate += item_bias[item];
                }
                if user_known && item_known {
                    estimate += dot(params.user_vector(user), params.item_vector(item));
                }
                Ok(estimate)
            }
            Biases::NoBias => {
                if !(user_known && item_known) {
                    return Err(MfError::ScorePredictionUnavailable { user, item });
                }
                Ok(dot(params.user_vector(user), params.item_vector(item)))
            }
        }
    }

    /// Per-item scores for `user`, or `None` when only the fallback applies.
    fn item_scores(&self, params: &FittedParams, user: usize) -> Option<Vec<f32>> {
        if params.is_known_user(user) {
            let mut scores = catalog_scores(&params.item_factors, params.user_vector(user), params.num_items);
            if self.config.learn_bias {
                if let Biases::WithBias { item_bias, .. } = &params.biases {
                    scores.iter_mut().zip(item_bias).for_each(|(s, b)| *s += b);
                }
            }
            return Some(scores);
        }
        match &params.biases {
            Biases::WithBias { item_bias, .. } => Some(item_bias.clone()),
            Biases::NoBias => None,
        }
    }

    fn fallback_rank(&self, state: &Trained, candidates: Option<&[usize]>) -> Vec<usize> {
        match &self.fallback {
            Some(fallback) => fallback.rank(candidates),
            None => state.popularity.rank(candidates),
        }
    }

    pub fn rank(&self, user: usize, candidates: Option<&[usize]>) -> Result<Vec<usize>> {
        let state = self.trained()?;
        let params = &state.params;
        match self.item_scores(params, user) {
            Some(scores) => Ok(rank_by_scores(&scores, candidates, params.min_rating)),
            None => Ok(self.fallback_rank(state, candidates)),
        }
    }

    /// Best `n` catalog items for `user` with their scores, skipping `exclude`.
    ///
    /// Unknown users without bias terms get the fallback order, each item
    /// reported with the training minimum rating as its score.
    pub fn recommend(&self, user: usize, n: usize, exclude: &[usize]) -> Result<Vec<(usize, f32)>> {
        let state = self.trained()?;
        let params = &state.params;
        let excluded: AHashSet<usize> = exclude.iter().copied().collect();
        match self.item_scores(params, user) {
            Some(scores) => Ok(top_n(&scores, n, &excluded)),
            None => Ok(self
                .fallback_rank(state, None)
                .into_iter()
                .filter(|i| *i < params.num_items && !excluded.contains(i))
                .take(n)
                .map(|i| (i, params.min_rating))
                .collect()),
        }
    }

    /// Top `n` items for every known user, computed in parallel.
    pub fn recommend_all(&self, n: usize) -> Result<Vec<Vec<(usize, f32)>>> {
        let params = &self.trained()?.params;
        let no_exclusions = AHashSet::new();
        Ok((0..params.num_users)
            .into_par_iter()
            .map(|user| match self.item_scores(params, user) {
                Some(scores) => top_n(&scores, n, &no_exclusions),
                None => Vec::new(),
            })
            .collect())
    }

    /// Write the fitted parameters as JSON.
    pub fn save_json<W: Write>(&self, writer: W) -> Result<()> {
        let params = &self.trained()?.params;
        serde_json::to_writer(writer, params)?;
        Ok(())
    }

    /// Read parameters written by [`MatrixFactorization::save_json`].
    pub fn load_json<R: Read>(config: MfConfig, reader: R) -> Result<Self> {
        let params: FittedParams = serde_json::from_reader(reader)?;
        Self::from_params(config, params)
    }
}

impl Recommender for MatrixFactorization {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn fit(&mut self, dataset: &dyn Dataset) -> FitReport {
        MatrixFactorization::fit(self, dataset)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn score(&self, user: usize, item: usize) -> Result<f32> {
        MatrixFactorization::score(self, user, item)
    }

    fn rank(&self, user: usize, candidates: Option<&[usize]>) -> Result<Vec<usize>> {
        MatrixFactorization::rank(self, user, candidates)
    }
}

fn sgd_train(dataset: &dyn Dataset, config: &MfConfig, progress: &mut dyn Progress) -> (FittedParams, FitReport) {
    let n_users = dataset.num_users();
    let n_items = dataset.num_items();
    let k = config.k;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let biases = if config.use_bias {
        Biases::WithBias {
            global_mean: dataset.global_mean(),
            user_bias: vec![0.0; n_users],
            item_bias: vec![0.0; n_items],
        }
    } else {
        Biases::NoBias
    };
    let mut params = FittedParams {
        k,
        num_users: n_users,
        num_items: n_items,
        user_factors: normal_factors(n_users, k, &mut rng),
        item_factors: normal_factors(n_items, k, &mut rng),
        biases,
        min_rating: dataset.min_rating(),
        unknown_users: (0..n_users).filter(|&u| dataset.is_unknown_user(u)).collect(),
        unknown_items: (0..n_items).filter(|&i| dataset.is_unknown_item(i)).collect(),
    };

    debug!(
        model = %config.name,
        users = n_users,
        items = n_items,
        ratings = dataset.interactions().nnz(),
        k,
        lr = config.learning_rate,
        reg = config.lambda_reg,
        use_bias = config.use_bias,
        "starting SGD"
    );

    let report = run_epochs(dataset.interactions(), &mut params, config, progress);
    (params, report)
}

/// SGD epochs over `interactions` in storage order, starting from `params`.
fn run_epochs(
    interactions: &Interactions,
    params: &mut FittedParams,
    config: &MfConfig,
    progress: &mut dyn Progress,
) -> FitReport {
    let k = params.k;
    let lr = config.learning_rate;
    let reg = config.lambda_reg;
    let lr_reg = lr * reg;
    let FittedParams { user_factors, item_factors, biases, .. } = params;

    let mut losses: Vec<f64> = Vec::with_capacity(config.max_iter);
    let mut early_stopped = false;

    for epoch in 1..=config.max_iter {
        let mut sse = 0.0f64;
        for (u, i, r) in interactions.iter() {
            let pu = &mut user_factors[u * k..(u + 1) * k];
            let qi = &mut item_factors[i * k..(i + 1) * k];
            let err = match &mut *biases {
                Biases::WithBias { global_mean, user_bias, item_bias } => {
                    let err = r - (*global_mean + user_bias[u] + item_bias[i] + dot(pu, qi));
                    if config.learn_bias {
                        user_bias[u] += lr * (err - reg * user_bias[u]);
                        item_bias[i] += lr * (err - reg * item_bias[i]);
                    }
                    err
                }
                Biases::NoBias => r - dot(pu, qi),
            };
            sse += (err as f64) * (err as f64);
            update_factors(pu, qi, lr * err, lr_reg);
        }

        let loss = 0.5 * sse;
        let converged = config.early_stop
            && losses
                .last()
                .is_some_and(|prev| (loss - prev).abs() < EARLY_STOP_TOLERANCE);
        losses.push(loss);
        progress.on_epoch(epoch, loss);
        if converged {
            early_stopped = true;
            break;
        }
    }

    FitReport { epochs: losses.len(), losses, early_stopped }
}
