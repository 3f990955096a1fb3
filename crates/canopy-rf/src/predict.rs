//! Prediction methods for the Random Forest ensemble.
//!
//! The forest votes softly: leaf class frequencies are averaged over the
//! trees in use and the argmax wins, lowest class index on ties.

use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RandomForest;

/// Index of the largest value, first one on ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

impl RandomForest {
    fn check_prefix(&self, n: usize) -> Result<(), RfError> {
        if self.trees.is_empty() || n == 0 {
            return Err(RfError::NotFitted);
        }
        if n > self.trees.len() {
            return Err(RfError::TreeCountOutOfRange {
                requested: n,
                available: self.trees.len(),
            });
        }
        Ok(())
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    /// Sum of leaf distributions over the first `n` trees.
    fn vote_sum(&self, n: usize, sample: &[f64]) -> Vec<f64> {
        let mut sum = vec![0.0f64; self.n_classes];
        for tree in &self.trees[..n] {
            for (acc, p) in sum.iter_mut().zip(tree.leaf_proba(sample)) {
                *acc += p;
            }
        }
        sum
    }

    /// Predict a batch of samples using only the first `n` trees.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::NotFitted`] | the forest is empty or `n == 0` |
    /// | [`RfError::TreeCountOutOfRange`] | `n > n_trees` |
    /// | [`RfError::PredictionFeatureMismatch`] | a sample has the wrong width |
    pub fn predict_first_n(&self, n: usize, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        self.check_prefix(n)?;
        features
            .par_iter()
            .map(|sample| {
                self.check_width(sample)?;
                Ok(argmax(&self.vote_sum(n, sample)))
            })
            .collect()
    }

    /// Predictions after each tree: entry `k` holds the predictions made by
    /// the first `k + 1` trees.
    ///
    /// Accumulates votes tree by tree, so the cost is one pass over the
    /// ensemble rather than one pass per prefix.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] for an empty forest,
    /// [`RfError::PredictionFeatureMismatch`] when a sample has the wrong width.
    pub fn staged_predict(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<usize>>, RfError> {
        let n_trees = self.trees.len();
        self.check_prefix(n_trees)?;

        // per_sample[i][k]: prediction for sample i with k + 1 trees.
        let per_sample: Vec<Vec<usize>> = features
            .into_par_iter()
            .map(|sample| {
                self.check_width(sample)?;
                let mut sum = vec![0.0f64; self.n_classes];
                let stages: Vec<usize> = self
                    .trees
                    .iter()
                    .map(|tree| {
                        for (acc, p) in sum.iter_mut().zip(tree.leaf_proba(sample)) {
                            *acc += p;
                        }
                        argmax(&sum)
                    })
                    .collect();
                Ok::<_, RfError>(stages)
            })
            .collect::<Result<_, _>>()?;

        Ok((0..n_trees)
            .map(|k| per_sample.iter().map(|stages| stages[k]).collect())
            .collect())
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::argmax;
    use crate::{RandomForestConfig, RfError};

    fn fitted(n_trees: usize) -> (crate::RandomForest, Vec<Vec<f64>>) {
        let features: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                let shift = if i < 15 { 0.0 } else { 4.0 };
                vec![(i % 10) as f64 + shift, (i % 3) as f64]
            })
            .collect();
        let labels: Vec<usize> = (0..30).map(|i| usize::from(i >= 15)).collect();
        let forest = RandomForestConfig::new(n_trees)
            .unwrap()
            .with_seed(5)
            .fit(&features, &labels)
            .unwrap();
        (forest, features)
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }

    #[test]
    fn staged_matches_prefix_predictions() {
        let (forest, features) = fitted(7);
        let staged = forest.staged_predict(&features).unwrap();
        assert_eq!(staged.len(), 7);
        for (k, stage) in staged.iter().enumerate() {
            assert_eq!(stage, &forest.predict_first_n(k + 1, &features).unwrap());
        }
    }

    #[test]
    fn prefix_bounds() {
        let (forest, features) = fitted(3);
        assert!(matches!(forest.predict_first_n(0, &features), Err(RfError::NotFitted)));
        assert!(matches!(
            forest.predict_first_n(4, &features),
            Err(RfError::TreeCountOutOfRange { requested: 4, available: 3 })
        ));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let (forest, _) = fitted(2);
        assert!(matches!(
            forest.predict_first_n(2, &[vec![1.0]]),
            Err(RfError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
        assert!(matches!(
            forest.staged_predict(&[vec![1.0, 2.0, 3.0]]),
            Err(RfError::PredictionFeatureMismatch { expected: 2, got: 3 })
        ));
    }
}
