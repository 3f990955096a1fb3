//! Warm-start forest growth, one tree at a time.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::forest::{RandomForest, grow_member};
use crate::split::SplitRules;
use crate::training::TrainingSet;

/// A forest that keeps its training data and seed stream so it can be
/// extended after the fact.
///
/// Each [`add_tree`](Self::add_tree) draws the next seed from the same
/// ChaCha8 master stream a batch fit uses, so after `n` calls the forest
/// equals the first `n` trees of `RandomForestConfig::fit` with the same
/// config.
#[derive(Debug)]
pub struct ForestGrower {
    data: TrainingSet,
    rules: SplitRules,
    master: ChaCha8Rng,
    forest: RandomForest,
}

impl ForestGrower {
    pub(crate) fn new(
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<Self, RfError> {
        let data = TrainingSet::from_rows(features, labels)?;
        let rules = config.split_rules(data.n_features())?;
        let forest = RandomForest::empty(data.n_features(), data.n_classes);
        Ok(Self {
            data,
            rules,
            master: ChaCha8Rng::seed_from_u64(config.seed),
            forest,
        })
    }

    /// Grow one more tree and append it to the forest.
    #[instrument(skip(self), fields(n_trees = self.forest.trees.len() + 1))]
    pub fn add_tree(&mut self) {
        let seed: u64 = self.master.r#gen();
        let tree = grow_member(&self.data, self.rules, seed);
        debug!(n_leaves = tree.n_leaves(), "tree added");
        self.forest.trees.push(tree);
    }

    /// Borrow the forest grown so far.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Number of trees grown so far.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.forest.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::{RandomForestConfig, RfError};

    fn data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64, (i % 7) as f64, (i * 3 % 11) as f64])
            .collect();
        let labels = (0..40).map(|i| usize::from(i >= 20)).collect();
        (features, labels)
    }

    #[test]
    fn starts_empty_and_refuses_prediction() {
        let (features, labels) = data();
        let grower = RandomForestConfig::new(1).unwrap().grower(&features, &labels).unwrap();
        assert_eq!(grower.n_trees(), 0);
        assert!(matches!(
            grower.forest().staged_predict(&features),
            Err(RfError::NotFitted)
        ));
    }

    #[test]
    fn grows_the_same_trees_as_a_batch_fit() {
        let (features, labels) = data();
        let cfg = RandomForestConfig::new(6).unwrap().with_max_features(2).with_seed(11);
        let batch = cfg.fit(&features, &labels).unwrap();

        let mut grower = cfg.grower(&features, &labels).unwrap();
        for n in 1..=6 {
            grower.add_tree();
            assert_eq!(
                grower.forest().predict_first_n(n, &features).unwrap(),
                batch.predict_first_n(n, &features).unwrap(),
                "prefix {n} diverged"
            );
        }
        assert_eq!(grower.n_trees(), 6);
    }
}
