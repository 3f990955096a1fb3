//! The seam between the pipeline and a tree-ensemble implementation.
//!
//! Search and sweep code is written once against [`ClassifierBackend`];
//! each backend library supplies one implementation.

use std::fmt;

use canopy_io::LabeledMatrix;
use serde::Serialize;

use crate::error::TuneError;
use crate::grid::HyperParams;

/// Which tree-ensemble library a backend wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The workspace's own forest (`canopy-rf`).
    Native,
    /// Bagged `linfa-trees` decision trees.
    Linfa,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Linfa => "linfa",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an accuracy curve is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepStrategy {
    /// Fit `N_max` trees once, score every prefix.
    Batch,
    /// Grow one tree at a time, score after each.
    Incremental,
}

impl SweepStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SweepStrategy::Batch => "batch",
            SweepStrategy::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SweepStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a backend needs to build one ensemble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub params: HyperParams,
    pub n_trees: usize,
    pub seed: u64,
}

impl ModelSpec {
    #[must_use]
    pub fn new(params: HyperParams, n_trees: usize, seed: u64) -> Self {
        Self {
            params,
            n_trees,
            seed,
        }
    }

    /// The same spec under another seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject specs that cannot be fitted on `n_features` columns.
    ///
    /// # Errors
    ///
    /// [`TuneError::InvalidTreeCount`] for zero trees, otherwise as
    /// [`HyperParams::check`].
    pub fn check(&self, n_features: usize) -> Result<(), TuneError> {
        if self.n_trees == 0 {
            return Err(TuneError::InvalidTreeCount { n_trees: 0 });
        }
        self.params.check(n_features)
    }
}

/// A fitted ensemble whose members are ordered.
pub trait EnsembleModel: Send + Sync {
    /// Trees currently in the ensemble.
    fn n_trees(&self) -> usize;

    /// Class predictions using only the first `n` trees.
    ///
    /// # Errors
    ///
    /// [`TuneError::NotFitted`] when `n == 0` or the ensemble is empty,
    /// [`TuneError::TreeCountOutOfRange`] when `n > n_trees()`.
    fn predict_first_n(&self, n: usize, data: &LabeledMatrix) -> Result<Vec<usize>, TuneError>;

    /// Class predictions using every tree.
    fn predict(&self, data: &LabeledMatrix) -> Result<Vec<usize>, TuneError> {
        self.predict_first_n(self.n_trees(), data)
    }

    /// Entry `k` holds the predictions of the first `k + 1` trees.
    fn staged_predict(&self, data: &LabeledMatrix) -> Result<Vec<Vec<usize>>, TuneError> {
        if self.n_trees() == 0 {
            return Err(TuneError::NotFitted);
        }
        (1..=self.n_trees())
            .map(|n| self.predict_first_n(n, data))
            .collect()
    }
}

/// An ensemble that can be extended after it was started (warm start).
pub trait IncrementalModel: EnsembleModel {
    /// Train exactly one more tree and append it.
    ///
    /// # Errors
    ///
    /// Backend training failures.
    fn add_tree(&mut self) -> Result<(), TuneError>;
}

/// A tree-ensemble library behind the pipeline.
pub trait ClassifierBackend: Sync {
    type Model: EnsembleModel;
    type Grower: IncrementalModel;

    fn kind(&self) -> BackendKind;

    /// Fit `spec.n_trees` trees on `data`.
    ///
    /// # Errors
    ///
    /// Invalid specs and backend training failures.
    fn fit(&self, spec: &ModelSpec, data: &LabeledMatrix) -> Result<Self::Model, TuneError>;

    /// An empty ensemble over `data` that grows one tree per `add_tree`.
    /// `spec.n_trees` is ignored.
    ///
    /// # Errors
    ///
    /// Invalid hyperparameters or an empty training set.
    fn start_incremental(
        &self,
        spec: &ModelSpec,
        data: &LabeledMatrix,
    ) -> Result<Self::Grower, TuneError>;

    /// Strategy used when the caller asks for `auto`.
    fn preferred_strategy(&self) -> SweepStrategy;
}

/// Fraction of `predicted` equal to the true labels of `data`.
///
/// # Errors
///
/// [`TuneError::EmptyPartition`] when `data` has no rows.
pub fn accuracy(predicted: &[usize], data: &LabeledMatrix) -> Result<f64, TuneError> {
    if data.is_empty() {
        return Err(TuneError::EmptyPartition {
            partition: "evaluation",
        });
    }
    let hits = predicted
        .iter()
        .zip(data.labels())
        .filter(|(p, t)| p == t)
        .count();
    Ok(hits as f64 / data.n_samples() as f64)
}
