//! Domain types for canopy-io.

use std::collections::BTreeSet;

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A labeled table: one categorical label and `k` numeric feature columns.
///
/// Labels are stored as class indices into [`classes`](Self::classes),
/// which holds the distinct label strings in sorted order.
#[derive(Debug, Clone)]
pub struct Dataset {
    label_column: String,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    labels: Vec<usize>,
    classes: Vec<String>,
}

impl Dataset {
    /// Assemble a dataset from parsed parts.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LabelCountMismatch`] | `features.len() != labels.len()` |
    /// | [`IoError::RaggedRow`] | a row's width differs from `feature_names.len()` |
    /// | [`IoError::NonFiniteValue`] | a value is NaN or infinite |
    pub fn from_parts(
        label_column: String,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        raw_labels: Vec<String>,
    ) -> Result<Self, IoError> {
        if features.len() != raw_labels.len() {
            return Err(IoError::LabelCountMismatch {
                n_rows: features.len(),
                n_labels: raw_labels.len(),
            });
        }
        for (row_index, row) in features.iter().enumerate() {
            if row.len() != feature_names.len() {
                return Err(IoError::RaggedRow {
                    row_index,
                    expected: feature_names.len(),
                    got: row.len(),
                });
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(IoError::NonFiniteValue {
                    column: feature_names[col].clone(),
                    row_index,
                });
            }
        }

        let classes: Vec<String> = raw_labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let labels = raw_labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or_default())
            .collect();

        Ok(Self {
            label_column,
            feature_names,
            features,
            labels,
            classes,
        })
    }

    #[must_use]
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Feature matrix, `features()[row][feature]`.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Class index of every row.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Distinct label strings, sorted; index `i` is class `i`.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Number of rows per class index.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for &l in &self.labels {
            counts[l] += 1;
        }
        counts
    }

    /// Copy the given rows, in the given order, into a [`LabeledMatrix`].
    ///
    /// # Panics
    ///
    /// Panics if a row index is out of range.
    #[must_use]
    pub fn select(&self, rows: &[usize]) -> LabeledMatrix {
        LabeledMatrix {
            features: rows.iter().map(|&r| self.features[r].clone()).collect(),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
            feature_names: self.feature_names.clone(),
            n_classes: self.classes.len(),
        }
    }

    /// Every row as a [`LabeledMatrix`].
    #[must_use]
    pub fn to_matrix(&self) -> LabeledMatrix {
        LabeledMatrix {
            features: self.features.clone(),
            labels: self.labels.clone(),
            feature_names: self.feature_names.clone(),
            n_classes: self.classes.len(),
        }
    }
}

/// Row-major features with a parallel vector of class indices.
///
/// `n_classes` comes from the parent dataset, so a subset that happens to
/// miss a class still reports the full class count.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    features: Vec<Vec<f64>>,
    labels: Vec<usize>,
    feature_names: Vec<String>,
    n_classes: usize,
}

impl LabeledMatrix {
    /// Build a matrix directly.
    ///
    /// # Errors
    ///
    /// [`IoError::LabelCountMismatch`] or [`IoError::RaggedRow`] when the
    /// shapes disagree.
    pub fn new(
        features: Vec<Vec<f64>>,
        labels: Vec<usize>,
        feature_names: Vec<String>,
        n_classes: usize,
    ) -> Result<Self, IoError> {
        if features.len() != labels.len() {
            return Err(IoError::LabelCountMismatch {
                n_rows: features.len(),
                n_labels: labels.len(),
            });
        }
        if let Some((row_index, row)) = features
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != feature_names.len())
        {
            return Err(IoError::RaggedRow {
                row_index,
                expected: feature_names.len(),
                got: row.len(),
            });
        }
        let n_classes = labels.iter().map(|&l| l + 1).max().unwrap_or(0).max(n_classes);
        Ok(Self {
            features,
            labels,
            feature_names,
            n_classes,
        })
    }

    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Copy the given rows into a new matrix with the same class count.
    ///
    /// # Panics
    ///
    /// Panics if a row index is out of range.
    #[must_use]
    pub fn subset(&self, rows: &[usize]) -> LabeledMatrix {
        LabeledMatrix {
            features: rows.iter().map(|&r| self.features[r].clone()).collect(),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
            feature_names: self.feature_names.clone(),
            n_classes: self.n_classes,
        }
    }

    /// Row indices of each class, in row order.
    #[must_use]
    pub fn rows_by_class(&self) -> Vec<Vec<usize>> {
        let mut by_class = vec![Vec::new(); self.n_classes];
        for (row, &label) in self.labels.iter().enumerate() {
            by_class[label].push(row);
        }
        by_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Dataset {
        Dataset::from_parts(
            "species".into(),
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            vec!["virginica".into(), "setosa".into(), "virginica".into()],
        )
        .unwrap()
    }

    #[test]
    fn classes_are_sorted_and_indexed() {
        let ds = small();
        assert_eq!(ds.classes(), ["setosa", "virginica"]);
        assert_eq!(ds.labels(), [1, 0, 1]);
        assert_eq!(ds.class_counts(), vec![1, 2]);
    }

    #[test]
    fn select_keeps_class_count() {
        let ds = small();
        let m = ds.select(&[2, 0]);
        assert_eq!(m.labels(), [1, 1]);
        assert_eq!(m.n_classes(), 2);
        assert_eq!(m.features()[0], vec![5.0, 6.0]);
        assert_eq!(m.rows_by_class(), vec![vec![], vec![0, 1]]);
    }

    #[test]
    fn non_finite_names_the_column() {
        let err = Dataset::from_parts(
            "y".into(),
            vec!["a".into(), "b".into()],
            vec![vec![1.0, f64::NAN]],
            vec!["x".into()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IoError::NonFiniteValue { ref column, row_index: 0 } if column == "b"
        ));
    }

    #[test]
    fn shape_mismatches_rejected() {
        let ragged = LabeledMatrix::new(vec![vec![1.0]], vec![0], vec!["a".into(), "b".into()], 1);
        assert!(matches!(ragged, Err(IoError::RaggedRow { expected: 2, got: 1, .. })));
        let counts = LabeledMatrix::new(vec![vec![1.0]], vec![], vec!["a".into()], 1);
        assert!(matches!(counts, Err(IoError::LabelCountMismatch { .. })));
    }

    #[test]
    fn experiment_name_rules() {
        assert_eq!(ExperimentName::new("run-01_a".into()).unwrap().as_str(), "run-01_a");
        assert!(ExperimentName::new(String::new()).is_err());
        assert!(ExperimentName::new("bad name!".into()).is_err());
    }
}
