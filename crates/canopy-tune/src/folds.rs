//! Stratified k-fold assignment for cross-validation.

use canopy_io::LabeledMatrix;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::error::TuneError;

/// Fold index of every row of a learn matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folds {
    assignment: Vec<usize>,
    n_folds: usize,
}

impl Folds {
    /// Shuffle each class's rows and deal them round-robin over `n_folds`.
    ///
    /// The deal continues across classes, so fold sizes differ by at most
    /// one overall and by at most one within each class. A class with fewer
    /// rows than folds is missing from some validation folds.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TuneError::InvalidFoldCount`] | `n_folds < 2` |
    /// | [`TuneError::TooFewSamplesForFolds`] | fewer rows than `n_folds` |
    pub fn stratified(data: &LabeledMatrix, n_folds: usize, seed: u64) -> Result<Self, TuneError> {
        if n_folds < 2 {
            return Err(TuneError::InvalidFoldCount { n_folds });
        }
        if data.n_samples() < n_folds {
            return Err(TuneError::TooFewSamplesForFolds {
                n_samples: data.n_samples(),
                n_folds,
            });
        }
        let mut by_class = data.rows_by_class();
        for (class, rows) in by_class.iter().enumerate() {
            if !rows.is_empty() && rows.len() < n_folds {
                warn!(class, n_samples = rows.len(), n_folds, "class smaller than fold count");
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut assignment = vec![0usize; data.n_samples()];
        let mut dealt = 0;
        for rows in &mut by_class {
            rows.shuffle(&mut rng);
            for &row in rows.iter() {
                assignment[row] = dealt % n_folds;
                dealt += 1;
            }
        }
        Ok(Self {
            assignment,
            n_folds,
        })
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    #[must_use]
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Rows outside `fold`, ascending.
    #[must_use]
    pub fn train_rows(&self, fold: usize) -> Vec<usize> {
        self.rows_where(|f| f != fold)
    }

    /// Rows inside `fold`, ascending.
    #[must_use]
    pub fn valid_rows(&self, fold: usize) -> Vec<usize> {
        self.rows_where(|f| f == fold)
    }

    fn rows_where(&self, keep: impl Fn(usize) -> bool) -> Vec<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter(|&(_, &f)| keep(f))
            .map(|(row, _)| row)
            .collect()
    }
}
