use numpy::{PyArray1, PyArray2, PyArrayMethods, PyReadonlyArray1};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::MfConfig;
use crate::dataset::{Interactions, TrainSet};
use crate::error::MfError;
use crate::metrics;
use crate::mf::{Biases, MatrixFactorization};

impl From<MfError> for PyErr {
    fn from(err: MfError) -> PyErr {
        match err {
            MfError::UntrainedModel => PyRuntimeError::new_err(err.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

fn to_index(value: i64, what: &str) -> PyResult<usize> {
    usize::try_from(value).map_err(|_| PyValueError::new_err(format!("negative {what}: {value}")))
}

#[pyclass(name = "MatrixFactorization")]
pub struct PyMatrixFactorization {
    inner: MatrixFactorization,
}

#[pymethods]
impl PyMatrixFactorization {
    #[new]
    #[pyo3(signature = (k=10, max_iter=20, learning_rate=0.01, lambda_reg=0.02, use_bias=true, early_stop=false, verbose=false, learn_bias=false, seed=None, name="MF".to_string()))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        k: usize,
        max_iter: usize,
        learning_rate: f32,
        lambda_reg: f32,
        use_bias: bool,
        early_stop: bool,
        verbose: bool,
        learn_bias: bool,
        seed: Option<u64>,
        name: String,
    ) -> PyResult<Self> {
        let config = MfConfig {
            name,
            k,
            max_iter,
            learning_rate,
            lambda_reg,
            use_bias,
            early_stop,
            verbose,
            learn_bias,
            seed,
        };
        Ok(Self { inner: MatrixFactorization::new(config)? })
    }

    /// Fit on a CSR user x item rating matrix; returns the per-epoch losses.
    pub fn fit(
        &mut self,
        py: Python<'_>,
        indptr: PyReadonlyArray1<i64>,
        indices: PyReadonlyArray1<i32>,
        data: PyReadonlyArray1<f32>,
        n_users: usize,
        n_items: usize,
    ) -> PyResult<Vec<f64>> {
        let indptr = indptr
            .as_slice()?
            .iter()
            .map(|&p| to_index(p, "indptr entry"))
            .collect::<PyResult<Vec<usize>>>()?;
        let indices = indices
            .as_slice()?
            .iter()
            .map(|&i| to_index(i as i64, "item index"))
            .collect::<PyResult<Vec<usize>>>()?;
        let data = data.as_slice()?.to_vec();
        let train_set = TrainSet::new(Interactions::from_csr(indptr, indices, data, n_users, n_items)?);

        let inner = &mut self.inner;
        let report = py.detach(|| inner.fit(&train_set));
        Ok(report.losses)
    }

    pub fn score(&self, user: usize, item: usize) -> PyResult<f32> {
        Ok(self.inner.score(user, item)?)
    }

    #[pyo3(signature = (user, candidates=None))]
    pub fn rank<'py>(
        &self,
        py: Python<'py>,
        user: usize,
        candidates: Option<Vec<usize>>,
    ) -> PyResult<Py<PyArray1<i64>>> {
        let order = self.inner.rank(user, candidates.as_deref())?;
        let ids: Vec<i64> = order.into_iter().map(|i| i as i64).collect();
        Ok(PyArray1::from_vec(py, ids).into())
    }

    #[pyo3(signature = (user, n, exclude=Vec::new()))]
    pub fn recommend<'py>(
        &self,
        py: Python<'py>,
        user: usize,
        n: usize,
        exclude: Vec<usize>,
    ) -> PyResult<(Py<PyArray1<i64>>, Py<PyArray1<f32>>)> {
        let recs = self.inner.recommend(user, n, &exclude)?;
        let ids: Vec<i64> = recs.iter().map(|&(i, _)| i as i64).collect();
        let scores: Vec<f32> = recs.iter().map(|&(_, s)| s).collect();
        Ok((
            PyArray1::from_vec(py, ids).into(),
            PyArray1::from_vec(py, scores).into(),
        ))
    }

    #[getter]
    pub fn user_factors<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f32>>> {
        let params = self.inner.params().ok_or(MfError::UntrainedModel)?;
        let arr = PyArray1::from_vec(py, params.user_factors.clone());
        Ok(arr.reshape([params.num_users, params.k])?.into())
    }

    #[getter]
    pub fn item_factors<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f32>>> {
        let params = self.inner.params().ok_or(MfError::UntrainedModel)?;
        let arr = PyArray1::from_vec(py, params.item_factors.clone());
        Ok(arr.reshape([params.num_items, params.k])?.into())
    }

    /// `(global_mean, user_bias, item_bias)`, or `None` without bias terms.
    #[getter]
    #[allow(clippy::type_complexity)]
    pub fn biases<'py>(
        &self,
        py: Python<'py>,
    ) -> PyResult<Option<(f32, Py<PyArray1<f32>>, Py<PyArray1<f32>>)>> {
        let params = self.inner.params().ok_or(MfError::UntrainedModel)?;
        Ok(match &params.biases {
            Biases::WithBias { global_mean, user_bias, item_bias } => Some((
                *global_mean,
                PyArray1::from_vec(py, user_bias.clone()).into(),
                PyArray1::from_vec(py, item_bias.clone()).into(),
            )),
            Biases::NoBias => None,
        })
    }

    #[getter]
    pub fn is_fitted(&self) -> bool {
        self.inner.params().is_some()
    }
}

#[pyfunction]
pub fn precision_at_k(actual: Vec<usize>, predicted: Vec<usize>, k: usize) -> f32 {
    metrics::precision_at_k(&actual, &predicted, k)
}

#[pyfunction]
pub fn recall_at_k(actual: Vec<usize>, predicted: Vec<usize>, k: usize) -> f32 {
    metrics::recall_at_k(&actual, &predicted, k)
}

#[pyfunction]
pub fn hit_rate_at_k(actual: Vec<usize>, predicted: Vec<usize>, k: usize) -> f32 {
    metrics::hit_rate_at_k(&actual, &predicted, k)
}

#[pyfunction]
pub fn ndcg_at_k(actual: Vec<usize>, predicted: Vec<usize>, k: usize) -> f32 {
    metrics::ndcg_at_k(&actual, &predicted, k)
}
