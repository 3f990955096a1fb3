//! Confusion matrix and per-class scores.

use std::fmt;

use crate::error::RfError;

/// Counts of `(true class, predicted class)` pairs.
///
/// Row `t`, column `p` holds how many samples of class `t` were predicted
/// as `p`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassMetrics {
    /// Class index.
    pub class: usize,
    /// `tp / (tp + fp)`, or 0.0 when the class was never predicted.
    pub precision: f64,
    /// `tp / (tp + fn)`, or 0.0 when the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0.0 when both are zero.
    pub f1: f64,
    /// Number of samples whose true class is `class`.
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ConfusionMatrix {
    /// Tally paired true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no labels |
    /// | [`RfError::LabelCountMismatch`] | `truth` and `predicted` differ in length |
    pub fn from_predictions(
        truth: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if truth.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if truth.len() != predicted.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: truth.len(),
                n_labels: predicted.len(),
            });
        }
        let width = truth
            .iter()
            .chain(predicted)
            .map(|&c| c + 1)
            .max()
            .unwrap_or(0)
            .max(n_classes);
        let mut counts = vec![vec![0usize; width]; width];
        for (&t, &p) in truth.iter().zip(predicted) {
            counts[t][p] += 1;
        }
        Ok(Self { counts })
    }

    /// Number of classes covered by the matrix.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.counts.len()
    }

    /// Rows of the matrix, indexed by true class.
    #[must_use]
    pub fn rows(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Total number of tallied samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Fraction of samples on the diagonal.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct = (0..self.n_classes()).map(|c| self.counts[c][c]).sum();
        ratio(correct, self.total())
    }

    /// One-vs-rest scores for every class.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes())
            .map(|c| {
                let tp = self.counts[c][c];
                let support: usize = self.counts[c].iter().sum();
                let predicted: usize = self.counts.iter().map(|row| row[c]).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "true\\pred")?;
        for c in 0..self.n_classes() {
            write!(f, "\t{c}")?;
        }
        for (t, row) in self.counts.iter().enumerate() {
            write!(f, "\n{t}")?;
            for n in row {
                write!(f, "\t{n}")?;
            }
        }
        Ok(())
    }
}
