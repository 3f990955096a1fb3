//! Random Forest training with parallel tree construction.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::split::SplitRules;
use crate::training::{TrainingSet, bootstrap};
use crate::tree::DecisionTree;

/// A fitted Random Forest ensemble.
///
/// Tree order is meaningful: prefix predictions use the first `n` trees in
/// the order they were drawn from the seed stream.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl RandomForest {
    pub(crate) fn empty(n_features: usize, n_classes: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_features,
            n_classes,
        }
    }
}

/// Grow the tree whose randomness is fully determined by `seed`.
pub(crate) fn grow_member(data: &TrainingSet, rules: SplitRules, seed: u64) -> DecisionTree {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let in_bag = bootstrap(data.n_samples(), &mut rng);
    DecisionTree::grow(data, &in_bag, rules, rng.r#gen())
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<RandomForest, RfError> {
    let data = TrainingSet::from_rows(features, labels)?;
    let rules = config.split_rules(data.n_features())?;

    info!(
        n_trees = config.n_trees,
        n_samples = data.n_samples(),
        n_features = data.n_features(),
        n_classes = data.n_classes,
        max_features = rules.max_features,
        "training random forest"
    );

    let mut master = ChaCha8Rng::seed_from_u64(config.seed);
    let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.r#gen()).collect();

    // Collecting an indexed parallel iterator keeps draw order.
    let trees: Vec<DecisionTree> = seeds
        .into_par_iter()
        .map(|seed| grow_member(&data, rules, seed))
        .collect();
    debug!(n_trees_trained = trees.len(), "tree training complete");

    Ok(RandomForest {
        trees,
        n_features: data.n_features(),
        n_classes: data.n_classes,
    })
}
