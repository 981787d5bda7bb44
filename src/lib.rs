//! Latent-factor matrix factorization trained by stochastic gradient descent.
//!
//! ```no_run
//! use mfsgd::{MatrixFactorization, MfConfig, TrainSet};
//!
//! let train = TrainSet::from_triples(&[(0, 0, 5.0), (0, 1, 3.0), (1, 1, 4.0)])?;
//! let mut model = MatrixFactorization::new(MfConfig { k: 8, ..Default::default() })?;
//! model.fit(&train);
//! let estimate = model.score(1, 0)?;
//! let ranking = model.rank(1, None)?;
//! # let _ = (estimate, ranking);
//! # Ok::<(), mfsgd::MfError>(())
//! ```

mod config;
mod dataset;
mod error;
mod fallback;
mod linalg;
mod mf;
mod progress;
mod ranking;
mod recommender;

pub mod metrics;
pub mod model_selection;

#[cfg(feature = "python")]
mod python;

pub use config::MfConfig;
pub use dataset::{Dataset, Interactions, TrainSet};
pub use error::{MfError, Result};
pub use fallback::{FallbackRanker, PopularityRanker};
pub use mf::{Biases, FittedParams, MatrixFactorization, EARLY_STOP_TOLERANCE};
pub use progress::{FitReport, NoProgress, Progress, TracingProgress};
pub use recommender::Recommender;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(feature = "python")]
#[pymodule]
fn mfsgd(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyMatrixFactorization>()?;
    m.add_function(wrap_pyfunction!(python::precision_at_k, m)?)?;
    m.add_function(wrap_pyfunction!(python::recall_at_k, m)?)?;
    m.add_function(wrap_pyfunction!(python::hit_rate_at_k, m)?)?;
    m.add_function(wrap_pyfunction!(python::ndcg_at_k, m)?)?;
    Ok(())
}
