use serde::{Deserialize, Serialize};

use crate::error::{MfError, Result};

/// Hyper-parameters of [`MatrixFactorization`](crate::MatrixFactorization).
///
/// Fixed at construction; a model never changes its configuration. Missing
/// fields fall back to their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfConfig {
    /// Display name used in log events.
    pub name: String,
    /// Latent dimensionality.
    pub k: usize,
    /// Maximum number of epochs.
    pub max_iter: usize,
    pub learning_rate: f32,
    /// L2 regularization applied to the factor updates.
    pub lambda_reg: f32,
    /// Include global mean and per-user/per-item biases in predictions.
    pub use_bias: bool,
    /// Stop once the epoch loss changes by less than `1e-5`.
    pub early_stop: bool,
    /// Report per-epoch loss through `tracing`.
    pub verbose: bool,
    /// Also update the bias vectors during SGD. Off by default, in which case
    /// biases stay at their zero initialization.
    pub learn_bias: bool,
    /// Seed for factor initialization; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for MfConfig {
    fn default() -> Self {
        Self {
            name: "MF".to_string(),
            k: 10,
            max_iter: 20,
            learning_rate: 0.01,
            lambda_reg: 0.02,
            use_bias: true,
            early_stop: false,
            verbose: false,
            learn_bias: false,
            seed: None,
        }
    }
}

impl MfConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(MfError::InvalidConfig("k must be positive".into()));
        }
        if self.max_iter == 0 {
            return Err(MfError::InvalidConfig("max_iter must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MfError::InvalidConfig(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        if !(self.lambda_reg.is_finite() && self.lambda_reg >= 0.0) {
            return Err(MfError::InvalidConfig(format!(
                "lambda_reg must be a non-negative finite number, got {}",
                self.lambda_reg
            )));
        }
        Ok(())
    }
}
