//! Configuration builder for Random Forest training.

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::grow::ForestGrower;
use crate::split::{Criterion, SplitRules};

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default        |
/// |--------------------|----------------|
/// | `max_features`     | every feature  |
/// | `min_samples_leaf` | 1              |
/// | `criterion`        | `Gini`         |
/// | `seed`             | 42             |
///
/// Trees grow until their leaves are pure or cannot be split without
/// leaving a child below `min_samples_leaf`.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: Criterion,
    pub(crate) seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: None,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            seed: 42,
        })
    }

    /// Set how many randomly drawn features each split examines.
    #[must_use]
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set the minimum number of samples (bootstrap repeats included)
    /// required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the master seed from which every per-tree seed is drawn.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the growth settings against a dataset width.
    pub(crate) fn split_rules(&self, n_features: usize) -> Result<SplitRules, RfError> {
        if self.min_samples_leaf == 0 {
            return Err(RfError::InvalidMinSamplesLeaf { min_samples_leaf: 0 });
        }
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(SplitRules {
            criterion: self.criterion,
            max_features,
            min_samples_leaf: self.min_samples_leaf,
        })
    }

    /// Train a Random Forest of `n_trees` trees.
    ///
    /// `features[sample][feature]` is row-major; `labels` are zero-based
    /// class indices.
    ///
    /// # Errors
    ///
    /// | Variant                            | When                                    |
    /// |------------------------------------|-----------------------------------------|
    /// | [`RfError::EmptyDataset`]          | `features` is empty                     |
    /// | [`RfError::ZeroFeatures`]          | rows have zero feature columns          |
    /// | [`RfError::FeatureCountMismatch`]  | rows have inconsistent lengths          |
    /// | [`RfError::LabelCountMismatch`]    | `labels.len() != features.len()`        |
    /// | [`RfError::NonFiniteValue`]        | any value is NaN or infinite            |
    /// | [`RfError::InvalidMaxFeatures`]    | max_features is outside [1, n_features] |
    /// | [`RfError::InvalidMinSamplesLeaf`] | min_samples_leaf is zero                |
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<RandomForest, RfError> {
        crate::forest::train(self, features, labels)
    }

    /// Start an empty forest that grows one tree per [`ForestGrower::add_tree`] call.
    ///
    /// `n_trees` is ignored; the caller decides how many trees to add.
    /// Trees are drawn from the same seed stream as [`fit`](Self::fit), so
    /// growing `n` trees reproduces the first `n` trees of a batch fit.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`fit`](Self::fit).
    pub fn grower(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<ForestGrower, RfError> {
        ForestGrower::new(self, features, labels)
    }
}
