//! Model selection for tree ensembles.
//!
//! [`StratifiedSplitter`] partitions a dataset per class, [`GridSearch`]
//! scores a [`ParamGrid`] by stratified k-fold cross-validation on a
//! bounded worker pool, and [`EnsembleSweep`] refits one setting and
//! traces test accuracy against the number of trees. Both run against
//! any [`ClassifierBackend`]; see [`backends`] for the two provided.

mod backend;
pub mod backends;
mod error;
mod folds;
mod grid;
mod search;
mod split;
mod sweep;

pub use backend::{
    BackendKind, ClassifierBackend, EnsembleModel, IncrementalModel, ModelSpec, SweepStrategy,
    accuracy,
};
pub use error::TuneError;
pub use folds::Folds;
pub use grid::{HyperParams, ParamGrid};
pub use search::{CvRecord, GridSearch, SearchResult};
pub use split::{Partition, SplitDataset, SplitScheme, StratifiedSplitter};
pub use sweep::{AccuracyCurve, CurvePoint, EnsembleSweep};
