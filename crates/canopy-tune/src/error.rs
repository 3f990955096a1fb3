//! Error types for canopy-tune.

use canopy_rf::RfError;

/// Errors from splitting, searching and sweeping.
#[derive(Debug, thiserror::Error)]
pub enum TuneError {
    /// Returned when a holdout learn fraction is outside (0, 1).
    #[error("learn fraction must be in (0, 1), got {fraction}")]
    InvalidFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// Returned when three-way cut points do not satisfy `0 < learn < valid < 1`.
    #[error("cut points must satisfy 0 < learn < valid < 1, got learn={learn}, valid={valid}")]
    InvalidCutPoints {
        /// Learn cut point.
        learn: f64,
        /// Valid cut point.
        valid: f64,
    },

    /// Returned when fewer than two folds are requested.
    #[error("n_folds must be >= 2, got {n_folds}")]
    InvalidFoldCount {
        /// The rejected fold count.
        n_folds: usize,
    },

    /// Returned when the learn set has fewer rows than folds.
    #[error("{n_samples} samples cannot fill n_folds={n_folds}")]
    TooFewSamplesForFolds {
        /// Rows in the learn set.
        n_samples: usize,
        /// Requested fold count.
        n_folds: usize,
    },

    /// Returned when a search is started with no grid points.
    #[error("hyperparameter grid is empty")]
    EmptyGrid,

    /// Returned when a grid point or refit setting cannot be trained on the data.
    #[error(
        "infeasible hyperparameters: max_features={max_features}, min_samples_leaf={min_samples_leaf} for {n_features} features"
    )]
    InfeasibleParams {
        /// Requested features per split.
        max_features: usize,
        /// Requested minimum leaf size.
        min_samples_leaf: usize,
        /// Feature columns available.
        n_features: usize,
    },

    /// Returned when an ensemble of zero trees is requested.
    #[error("tree count must be >= 1, got {n_trees}")]
    InvalidTreeCount {
        /// The rejected count.
        n_trees: usize,
    },

    /// Returned when a worker pool of zero threads is requested.
    #[error("worker count must be >= 1")]
    InvalidWorkerCount,

    /// Returned when predicting with an ensemble that has no trees yet.
    #[error("model has no trees; fit or grow it before predicting")]
    NotFitted,

    /// Returned when a prefix longer than the ensemble is requested.
    #[error("requested the first {requested} trees but the ensemble has {available}")]
    TreeCountOutOfRange {
        /// Requested prefix length.
        requested: usize,
        /// Trees in the ensemble.
        available: usize,
    },

    /// Returned when a model is fitted or scored on zero rows.
    #[error("{partition} set is empty")]
    EmptyPartition {
        /// Which set was empty.
        partition: &'static str,
    },

    /// Returned when prediction rows have a different width than training rows.
    #[error("expected {expected} features, got {got}")]
    FeatureMismatch {
        /// Training width.
        expected: usize,
        /// Prediction width.
        got: usize,
    },

    /// Native forest failure.
    #[error(transparent)]
    Rf(RfError),

    /// linfa fit failure.
    #[error("linfa: {0}")]
    Linfa(#[from] linfa::Error),

    /// Matrix conversion failure.
    #[error("matrix shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// The bounded worker pool could not be built.
    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<RfError> for TuneError {
    fn from(e: RfError) -> Self {
        match e {
            RfError::NotFitted => TuneError::NotFitted,
            RfError::TreeCountOutOfRange {
                requested,
                available,
            } => TuneError::TreeCountOutOfRange {
                requested,
                available,
            },
            other => TuneError::Rf(other),
        }
    }
}
