use thiserror::Error;

/// Errors surfaced by training, inference and the evaluation helpers.
#[derive(Debug, Error)]
pub enum MfError {
    #[error("model has not been fitted; call fit() before score() or rank()")]
    UntrainedModel,

    /// Raised without bias terms when either endpoint was not seen during fit.
    #[error("cannot score user {user} / item {item}: one of them is unknown and bias terms are disabled")]
    ScorePredictionUnavailable { user: usize, item: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid interactions: {0}")]
    InvalidInteractions(String),

    #[error("parameter shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MfError>;
