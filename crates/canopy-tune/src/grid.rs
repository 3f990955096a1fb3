//! Hyperparameter points and their Cartesian grid.

use std::fmt;

use canopy_rf::Criterion;
use serde::Serialize;

use crate::error::TuneError;

/// One hyperparameter setting shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HyperParams {
    /// Features considered per split (native) or per tree subspace (linfa).
    pub max_features: usize,
    /// Minimum rows in a leaf, counting bootstrap duplicates.
    ///
    /// The native trees count repeated in-bag indices, and the linfa members
    /// train on the materialized bootstrap rows with unit weights through
    /// `min_weight_leaf`, so both backends apply the same bound.
    pub min_samples_leaf: usize,
    /// Split quality measure.
    pub criterion: Criterion,
}

impl HyperParams {
    #[must_use]
    pub fn new(max_features: usize, min_samples_leaf: usize, criterion: Criterion) -> Self {
        Self {
            max_features,
            min_samples_leaf,
            criterion,
        }
    }

    /// Check the setting can be trained on `n_features` columns.
    ///
    /// # Errors
    ///
    /// [`TuneError::InfeasibleParams`] unless `1 <= max_features <= n_features`
    /// and `min_samples_leaf >= 1`.
    pub fn check(&self, n_features: usize) -> Result<(), TuneError> {
        if self.max_features == 0 || self.max_features > n_features || self.min_samples_leaf == 0 {
            return Err(TuneError::InfeasibleParams {
                max_features: self.max_features,
                min_samples_leaf: self.min_samples_leaf,
                n_features,
            });
        }
        Ok(())
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_features={} min_samples_leaf={} criterion={}",
            self.max_features, self.min_samples_leaf, self.criterion
        )
    }
}

/// Candidate values per hyperparameter.
///
/// Points enumerate with `max_features` outermost and `criterion`
/// innermost, in the order the values were given.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    max_features: Vec<usize>,
    min_samples_leaf: Vec<usize>,
    criteria: Vec<Criterion>,
}

impl ParamGrid {
    /// Grid over `max_features` × `min_samples_leaf` with the Gini criterion.
    pub fn new(max_features: Vec<usize>, min_samples_leaf: Vec<usize>) -> Self {
        Self {
            max_features,
            min_samples_leaf,
            criteria: vec![Criterion::Gini],
        }
    }

    #[must_use]
    pub fn with_criteria(mut self, criteria: Vec<Criterion>) -> Self {
        self.criteria = criteria;
        self
    }

    /// Every combination, in enumeration order.
    #[must_use]
    pub fn points(&self) -> Vec<HyperParams> {
        let mut points = Vec::with_capacity(self.len());
        for &max_features in &self.max_features {
            for &min_samples_leaf in &self.min_samples_leaf {
                for &criterion in &self.criteria {
                    points.push(HyperParams::new(max_features, min_samples_leaf, criterion));
                }
            }
        }
        points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.max_features.len() * self.min_samples_leaf.len() * self.criteria.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
