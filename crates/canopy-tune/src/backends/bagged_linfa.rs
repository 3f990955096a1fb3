//! Backend over `linfa-trees`: a bagged random-subspace ensemble.
//!
//! Each member sees a bootstrap sample of the rows and a random subset of
//! `max_features` columns, and is a plain `linfa_trees::DecisionTree`.
//! Members vote hard; ties go to the lower class index.

use canopy_io::LabeledMatrix;
use linfa::Dataset;
use linfa::traits::{Fit, Predict};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use canopy_rf::Criterion;

use crate::backend::{
    BackendKind, ClassifierBackend, EnsembleModel, IncrementalModel, ModelSpec, SweepStrategy,
};
use crate::error::TuneError;
use crate::grid::HyperParams;

fn split_quality(criterion: Criterion) -> SplitQuality {
    match criterion {
        Criterion::Gini => SplitQuality::Gini,
        Criterion::Entropy => SplitQuality::Entropy,
    }
}

fn to_records(data: &LabeledMatrix) -> Result<Array2<f64>, TuneError> {
    let flat: Vec<f64> = data.features().iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((data.n_samples(), data.n_features()), flat)?)
}

/// Lowest index among the most-voted classes.
fn majority(votes: &[usize]) -> usize {
    votes
        .iter()
        .enumerate()
        .fold((0, 0), |best, (class, &n)| if n > best.1 { (class, n) } else { best })
        .0
}

/// Training data in linfa's matrix form.
#[derive(Debug)]
struct Training {
    records: Array2<f64>,
    targets: Array1<usize>,
    n_classes: usize,
}

impl Training {
    fn new(data: &LabeledMatrix) -> Result<Self, TuneError> {
        if data.is_empty() {
            return Err(TuneError::EmptyPartition {
                partition: "training",
            });
        }
        Ok(Self {
            records: to_records(data)?,
            targets: Array1::from_vec(data.labels().to_vec()),
            n_classes: data.n_classes(),
        })
    }
}

#[derive(Debug)]
struct Member {
    tree: DecisionTree<f64, usize>,
    columns: Vec<usize>,
}

impl Member {
    /// Grow the member whose bootstrap and subspace are fully determined by `seed`.
    fn grow(data: &Training, params: HyperParams, seed: u64) -> Result<Self, TuneError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n_rows = data.records.nrows();
        let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
        let mut columns = sample(&mut rng, data.records.ncols(), params.max_features).into_vec();
        columns.sort_unstable();

        let x = data.records.select(Axis(0), &rows).select(Axis(1), &columns);
        let y = data.targets.select(Axis(0), &rows);
        let tree = DecisionTree::params()
            .split_quality(split_quality(params.criterion))
            .min_weight_leaf(params.min_samples_leaf as f32)
            .max_depth(None)
            .fit(&Dataset::new(x, y))?;
        Ok(Self { tree, columns })
    }

    fn vote(&self, records: &Array2<f64>, votes: &mut [Vec<usize>]) {
        let predicted: Array1<usize> = self.tree.predict(&records.select(Axis(1), &self.columns));
        for (counts, &class) in votes.iter_mut().zip(predicted.iter()) {
            if let Some(slot) = counts.get_mut(class) {
                *slot += 1;
            }
        }
    }
}

/// A fitted bagged linfa ensemble.
#[derive(Debug)]
pub struct LinfaForest {
    members: Vec<Member>,
    n_features: usize,
    n_classes: usize,
}

impl LinfaForest {
    fn check_prefix(&self, n: usize) -> Result<(), TuneError> {
        if self.members.is_empty() || n == 0 {
            return Err(TuneError::NotFitted);
        }
        if n > self.members.len() {
            return Err(TuneError::TreeCountOutOfRange {
                requested: n,
                available: self.members.len(),
            });
        }
        Ok(())
    }

    fn records(&self, data: &LabeledMatrix) -> Result<Array2<f64>, TuneError> {
        if data.n_features() != self.n_features {
            return Err(TuneError::FeatureMismatch {
                expected: self.n_features,
                got: data.n_features(),
            });
        }
        to_records(data)
    }

    /// Column subspace of every member, in member order.
    #[must_use]
    pub fn subspaces(&self) -> Vec<&[usize]> {
        self.members.iter().map(|m| m.columns.as_slice()).collect()
    }
}

impl EnsembleModel for LinfaForest {
    fn n_trees(&self) -> usize {
        self.members.len()
    }

    fn predict_first_n(&self, n: usize, data: &LabeledMatrix) -> Result<Vec<usize>, TuneError> {
        self.check_prefix(n)?;
        let records = self.records(data)?;
        let mut votes = vec![vec![0usize; self.n_classes]; records.nrows()];
        for member in &self.members[..n] {
            member.vote(&records, &mut votes);
        }
        Ok(votes.iter().map(|v| majority(v)).collect())
    }

    fn staged_predict(&self, data: &LabeledMatrix) -> Result<Vec<Vec<usize>>, TuneError> {
        self.check_prefix(self.members.len())?;
        let records = self.records(data)?;
        let mut votes = vec![vec![0usize; self.n_classes]; records.nrows()];
        let mut stages = Vec::with_capacity(self.members.len());
        for member in &self.members {
            member.vote(&records, &mut votes);
            stages.push(votes.iter().map(|v| majority(v)).collect());
        }
        Ok(stages)
    }
}

/// Bagged `linfa-trees` decision trees with per-tree random subspaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinfaBackend;

impl ClassifierBackend for LinfaBackend {
    type Model = LinfaForest;
    type Grower = LinfaGrower;

    fn kind(&self) -> BackendKind {
        BackendKind::Linfa
    }

    #[instrument(
        skip_all,
        fields(backend = "linfa", n_trees = spec.n_trees, n_samples = data.n_samples())
    )]
    fn fit(&self, spec: &ModelSpec, data: &LabeledMatrix) -> Result<LinfaForest, TuneError> {
        spec.check(data.n_features())?;
        let training = Training::new(data)?;

        let mut master = ChaCha8Rng::seed_from_u64(spec.seed);
        let seeds: Vec<u64> = (0..spec.n_trees).map(|_| master.r#gen()).collect();
        let members = seeds
            .into_par_iter()
            .map(|seed| Member::grow(&training, spec.params, seed))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(params = %spec.params, "linfa ensemble fitted");
        Ok(LinfaForest {
            members,
            n_features: data.n_features(),
            n_classes: training.n_classes,
        })
    }

    fn start_incremental(
        &self,
        spec: &ModelSpec,
        data: &LabeledMatrix,
    ) -> Result<LinfaGrower, TuneError> {
        spec.params.check(data.n_features())?;
        let training = Training::new(data)?;
        let forest = LinfaForest {
            members: Vec::new(),
            n_features: data.n_features(),
            n_classes: training.n_classes,
        };
        Ok(LinfaGrower {
            training,
            params: spec.params,
            master: ChaCha8Rng::seed_from_u64(spec.seed),
            forest,
        })
    }

    fn preferred_strategy(&self) -> SweepStrategy {
        SweepStrategy::Incremental
    }
}

/// A warm-start linfa ensemble. After `n` calls to `add_tree` it holds the
/// same members as a batch fit of `n` trees under the same seed.
#[derive(Debug)]
pub struct LinfaGrower {
    training: Training,
    params: HyperParams,
    master: ChaCha8Rng,
    forest: LinfaForest,
}

impl LinfaGrower {
    #[must_use]
    pub fn forest(&self) -> &LinfaForest {
        &self.forest
    }
}

impl EnsembleModel for LinfaGrower {
    fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    fn predict_first_n(&self, n: usize, data: &LabeledMatrix) -> Result<Vec<usize>, TuneError> {
        self.forest.predict_first_n(n, data)
    }

    fn staged_predict(&self, data: &LabeledMatrix) -> Result<Vec<Vec<usize>>, TuneError> {
        self.forest.staged_predict(data)
    }
}

impl IncrementalModel for LinfaGrower {
    fn add_tree(&mut self) -> Result<(), TuneError> {
        let seed: u64 = self.master.r#gen();
        let member = Member::grow(&self.training, self.params, seed)?;
        self.forest.members.push(member);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Class is decided by feature 0 alone; features 1-3 are noise.
    fn data(n: usize) -> LabeledMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let features = labels
            .iter()
            .map(|&c| {
                let mut row = vec![c as f64 * 4.0 + rng.gen_range(0.0..1.0)];
                row.extend((0..3).map(|_| rng.gen_range(0.0..1.0)));
                row
            })
            .collect();
        let names = (0..4).map(|f| format!("f{f}")).collect();
        LabeledMatrix::new(features, labels, names, 2).unwrap()
    }

    fn spec(max_features: usize, n_trees: usize) -> ModelSpec {
        ModelSpec::new(HyperParams::new(max_features, 1, Criterion::Gini), n_trees, 8)
    }

    #[test]
    fn majority_breaks_ties_low() {
        assert_eq!(majority(&[2, 2, 1]), 0);
        assert_eq!(majority(&[0, 3, 3]), 1);
        assert_eq!(majority(&[0, 0]), 0);
    }

    #[test]
    fn full_subspace_learns_the_signal() {
        let d = data(80);
        let model = LinfaBackend.fit(&spec(4, 15), &d).unwrap();
        assert_eq!(model.n_trees(), 15);
        let predicted = model.predict(&d).unwrap();
        let hits = predicted.iter().zip(d.labels()).filter(|(p, t)| p == t).count();
        assert!(hits >= 76, "{hits}/80 correct");
    }

    #[test]
    fn subspaces_have_requested_width() {
        let model = LinfaBackend.fit(&spec(2, 6), &data(40)).unwrap();
        for cols in model.subspaces() {
            assert_eq!(cols.len(), 2);
            assert!(cols.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn staged_matches_prefixes() {
        let d = data(40);
        let model = LinfaBackend.fit(&spec(3, 5), &d).unwrap();
        let staged = model.staged_predict(&d).unwrap();
        for (k, stage) in staged.iter().enumerate() {
            assert_eq!(stage, &model.predict_first_n(k + 1, &d).unwrap());
        }
    }

    #[test]
    fn grower_reproduces_batch() {
        let d = data(40);
        let batch = LinfaBackend.fit(&spec(3, 4), &d).unwrap();
        let mut grower = LinfaBackend.start_incremental(&spec(3, 4), &d).unwrap();
        assert!(matches!(grower.predict(&d), Err(TuneError::NotFitted)));
        for n in 1..=4 {
            grower.add_tree().unwrap();
            assert_eq!(grower.predict(&d).unwrap(), batch.predict_first_n(n, &d).unwrap());
        }
        assert_eq!(grower.forest().subspaces(), batch.subspaces());
    }

    #[test]
    fn empty_training_set_rejected() {
        let empty = LabeledMatrix::new(Vec::new(), Vec::new(), vec!["a".into()], 2).unwrap();
        assert!(matches!(
            LinfaBackend.fit(&spec(1, 3), &empty),
            Err(TuneError::EmptyPartition { .. })
        ));
    }

    #[test]
    fn wrong_width_rejected_at_prediction() {
        let model = LinfaBackend.fit(&spec(2, 2), &data(20)).unwrap();
        let narrow = LabeledMatrix::new(vec![vec![1.0]], vec![0], vec!["a".into()], 2).unwrap();
        assert!(matches!(
            model.predict(&narrow),
            Err(TuneError::FeatureMismatch { expected: 4, got: 1 })
        ));
    }
}
