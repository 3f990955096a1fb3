//! Stratified learn/test (or learn/valid/test) assignment.

use std::fmt;

use canopy_io::{Dataset, LabeledMatrix, PartitionCounts, SplitReport};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::TuneError;

/// Absorbs representation error in `fraction * n` so that, say,
/// `0.85 * 20` floors to 17 rather than 16.
const FLOOR_SLACK: f64 = 1e-9;

fn share(fraction: f64, n: usize) -> usize {
    (fraction * n as f64 + FLOOR_SLACK).floor() as usize
}

/// Which partition a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Learn,
    Valid,
    Test,
}

impl Partition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Learn => "learn",
            Partition::Valid => "valid",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How each class's permuted rows are cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitScheme {
    /// First `⌊learn_fraction·n⌋` rows learn, the rest test.
    Holdout { learn_fraction: f64 },
    /// First `⌊learn·n⌋` rows learn, up to `⌊valid·n⌋` valid, the rest test.
    ThreeWay { learn: f64, valid: f64 },
}

impl SplitScheme {
    /// Holdout split with the given learn fraction.
    ///
    /// # Errors
    ///
    /// [`TuneError::InvalidFraction`] unless `0 < learn_fraction < 1`.
    pub fn holdout(learn_fraction: f64) -> Result<Self, TuneError> {
        if !(learn_fraction > 0.0 && learn_fraction < 1.0) {
            return Err(TuneError::InvalidFraction {
                fraction: learn_fraction,
            });
        }
        Ok(SplitScheme::Holdout { learn_fraction })
    }

    /// Three-way split with cumulative cut points.
    ///
    /// # Errors
    ///
    /// [`TuneError::InvalidCutPoints`] unless `0 < learn < valid < 1`.
    pub fn three_way(learn: f64, valid: f64) -> Result<Self, TuneError> {
        if !(learn > 0.0 && learn < valid && valid < 1.0) {
            return Err(TuneError::InvalidCutPoints { learn, valid });
        }
        Ok(SplitScheme::ThreeWay { learn, valid })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SplitScheme::Holdout { .. } => "holdout",
            SplitScheme::ThreeWay { .. } => "three-way",
        }
    }

    /// Partition of the row at `rank` among `n` permuted rows of one class.
    fn assign(&self, rank: usize, n: usize) -> Partition {
        match *self {
            SplitScheme::Holdout { learn_fraction } => {
                if rank < share(learn_fraction, n) {
                    Partition::Learn
                } else {
                    Partition::Test
                }
            }
            SplitScheme::ThreeWay { learn, valid } => {
                if rank < share(learn, n) {
                    Partition::Learn
                } else if rank < share(valid, n) {
                    Partition::Valid
                } else {
                    Partition::Test
                }
            }
        }
    }
}

impl Default for SplitScheme {
    fn default() -> Self {
        SplitScheme::Holdout { learn_fraction: 0.8 }
    }
}

/// Assigns rows to partitions class by class.
///
/// Construct via [`StratifiedSplitter::new`], then chain `with_scheme`.
#[derive(Debug, Clone)]
pub struct StratifiedSplitter {
    seed: u64,
    scheme: SplitScheme,
}

impl StratifiedSplitter {
    /// 0.8 holdout split under `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            scheme: SplitScheme::default(),
        }
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: SplitScheme) -> Self {
        self.scheme = scheme;
        self
    }

    #[must_use]
    pub fn scheme(&self) -> SplitScheme {
        self.scheme
    }

    /// Assign every row of `dataset`.
    ///
    /// One ChaCha8 stream, seeded once, shuffles each class's rows in class
    /// index order; the shuffled rows are then cut by rank. A class with a
    /// single row may leave one partition without that class.
    ///
    /// # Errors
    ///
    /// [`TuneError::InvalidFraction`] or [`TuneError::InvalidCutPoints`] when
    /// the scheme was built by hand with out-of-range values.
    #[instrument(
        skip_all,
        fields(scheme = self.scheme.name(), seed = self.seed, n_samples = dataset.n_samples())
    )]
    pub fn split(&self, dataset: Dataset) -> Result<SplitDataset, TuneError> {
        match self.scheme {
            SplitScheme::Holdout { learn_fraction } => {
                SplitScheme::holdout(learn_fraction)?;
            }
            SplitScheme::ThreeWay { learn, valid } => {
                SplitScheme::three_way(learn, valid)?;
            }
        }

        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); dataset.n_classes()];
        for (row, &label) in dataset.labels().iter().enumerate() {
            by_class[label].push(row);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![Partition::Test; dataset.n_samples()];
        for (class, rows) in by_class.iter_mut().enumerate() {
            rows.shuffle(&mut rng);
            let n = rows.len();
            for (rank, &row) in rows.iter().enumerate() {
                assignment[row] = self.scheme.assign(rank, n);
            }
            debug!(class, n_rows = n, "class assigned");
        }

        let split = SplitDataset {
            dataset,
            assignment,
            scheme: self.scheme,
            seed: self.seed,
        };
        info!(
            learn = split.rows(Partition::Learn).len(),
            valid = split.rows(Partition::Valid).len(),
            test = split.rows(Partition::Test).len(),
            "dataset split"
        );
        Ok(split)
    }
}

/// A dataset together with its fixed row-to-partition assignment.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    dataset: Dataset,
    assignment: Vec<Partition>,
    scheme: SplitScheme,
    seed: u64,
}

impl SplitDataset {
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Partition of every row, in row order.
    #[must_use]
    pub fn assignment(&self) -> &[Partition] {
        &self.assignment
    }

    /// Row indices assigned to `partition`, ascending.
    #[must_use]
    pub fn rows(&self, partition: Partition) -> Vec<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p == partition)
            .map(|(row, _)| row)
            .collect()
    }

    /// Labeled matrix of the rows in `partition`.
    #[must_use]
    pub fn matrix(&self, partition: Partition) -> LabeledMatrix {
        self.dataset.select(&self.rows(partition))
    }

    /// `counts[class]` = rows of that class in (learn, valid, test).
    #[must_use]
    pub fn class_counts(&self) -> Vec<[usize; 3]> {
        let mut counts = vec![[0usize; 3]; self.dataset.n_classes()];
        for (&label, &p) in self.dataset.labels().iter().zip(&self.assignment) {
            let slot = match p {
                Partition::Learn => 0,
                Partition::Valid => 1,
                Partition::Test => 2,
            };
            counts[label][slot] += 1;
        }
        counts
    }

    /// Per-class counts in the shape the result writer expects.
    #[must_use]
    pub fn report(&self) -> SplitReport {
        let three_way = matches!(self.scheme, SplitScheme::ThreeWay { .. });
        SplitReport {
            scheme: self.scheme.name().to_string(),
            seed: self.seed,
            n_samples: self.dataset.n_samples(),
            classes: self
                .dataset
                .classes()
                .iter()
                .zip(self.class_counts())
                .map(|(class, [learn, valid, test])| PartitionCounts {
                    class: class.clone(),
                    learn,
                    valid: three_way.then_some(valid),
                    test,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(per_class: &[usize]) -> Dataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (c, &n) in per_class.iter().enumerate() {
            for i in 0..n {
                features.push(vec![i as f64, c as f64]);
                labels.push(format!("c{c}"));
            }
        }
        Dataset::from_parts("y".into(), vec!["a".into(), "b".into()], features, labels).unwrap()
    }

    #[test]
    fn holdout_counts_per_class() {
        let split = StratifiedSplitter::new(1).split(dataset(&[500, 500])).unwrap();
        assert_eq!(split.rows(Partition::Learn).len(), 800);
        assert_eq!(split.rows(Partition::Test).len(), 200);
        assert_eq!(split.class_counts(), vec![[400, 0, 100], [400, 0, 100]]);
    }

    #[test]
    fn three_way_cut_points() {
        let split = StratifiedSplitter::new(3)
            .with_scheme(SplitScheme::three_way(0.70, 0.85).unwrap())
            .split(dataset(&[20, 40]))
            .unwrap();
        assert_eq!(split.class_counts(), vec![[14, 3, 3], [28, 6, 6]]);
    }

    #[test]
    fn same_seed_same_assignment() {
        let a = StratifiedSplitter::new(9).split(dataset(&[30, 17])).unwrap();
        let b = StratifiedSplitter::new(9).split(dataset(&[30, 17])).unwrap();
        let c = StratifiedSplitter::new(10).split(dataset(&[30, 17])).unwrap();
        assert_eq!(a.assignment(), b.assignment());
        assert_ne!(a.assignment(), c.assignment());
    }

    #[test]
    fn singleton_class_is_accepted() {
        let split = StratifiedSplitter::new(1).split(dataset(&[10, 1])).unwrap();
        assert_eq!(split.class_counts()[1], [0, 0, 1]);
    }

    #[test]
    fn learn_and_test_partition_each_class() {
        let split = StratifiedSplitter::new(4)
            .with_scheme(SplitScheme::holdout(0.63).unwrap())
            .split(dataset(&[13, 29, 7]))
            .unwrap();
        for (counts, n) in split.class_counts().iter().zip([13usize, 29, 7]) {
            assert_eq!(counts[0] + counts[2], n);
            assert!((counts[0] as f64 - 0.63 * n as f64).abs() <= 1.0);
        }
    }

    #[test]
    fn bad_fractions_rejected() {
        assert!(matches!(SplitScheme::holdout(1.0), Err(TuneError::InvalidFraction { .. })));
        assert!(SplitScheme::holdout(0.0).is_err());
        assert!(matches!(
            SplitScheme::three_way(0.9, 0.8),
            Err(TuneError::InvalidCutPoints { .. })
        ));
        let hand_built = StratifiedSplitter::new(1)
            .with_scheme(SplitScheme::Holdout { learn_fraction: 1.5 })
            .split(dataset(&[4, 4]));
        assert!(hand_built.is_err());
    }

    #[test]
    fn report_omits_valid_for_holdout() {
        let split = StratifiedSplitter::new(1).split(dataset(&[10, 10])).unwrap();
        let report = split.report();
        assert_eq!(report.scheme, "holdout");
        assert_eq!(report.classes[0].valid, None);
        assert_eq!(report.classes[1].class, "c1");
        assert_eq!(split.matrix(Partition::Learn).n_samples(), 16);
    }
}
