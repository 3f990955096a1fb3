//! Validated, column-major training data shared by every tree of a forest.

use rand::Rng;

use crate::error::RfError;

/// Training data after validation.
///
/// `columns[feature][sample]`: each split search scans one contiguous column.
#[derive(Debug, Clone)]
pub(crate) struct TrainingSet {
    pub(crate) columns: Vec<Vec<f64>>,
    pub(crate) labels: Vec<usize>,
    pub(crate) n_classes: usize,
}

impl TrainingSet {
    /// Validate row-major input and transpose it.
    pub(crate) fn from_rows(features: &[Vec<f64>], labels: &[usize]) -> Result<Self, RfError> {
        let Some(first) = features.first() else {
            return Err(RfError::EmptyDataset);
        };
        let n_features = first.len();
        if n_features == 0 {
            return Err(RfError::ZeroFeatures);
        }
        if labels.len() != features.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: labels.len(),
            });
        }

        let mut columns = vec![Vec::with_capacity(features.len()); n_features];
        for (sample_index, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(RfError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            for (feature_index, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(RfError::NonFiniteValue {
                        sample_index,
                        feature_index,
                    });
                }
                columns[feature_index].push(value);
            }
        }

        let n_classes = labels.iter().max().map_or(1, |&max| max + 1);
        Ok(Self {
            columns,
            labels: labels.to_vec(),
            n_classes,
        })
    }

    pub(crate) fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub(crate) fn n_features(&self) -> usize {
        self.columns.len()
    }
}

/// `n_samples` indices drawn uniformly with replacement.
pub(crate) fn bootstrap(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}
