//! Backend over the workspace's own forest library.

use canopy_io::LabeledMatrix;
use canopy_rf::{ForestGrower, RandomForest, RandomForestConfig};
use tracing::{debug, instrument};

use crate::backend::{
    BackendKind, ClassifierBackend, EnsembleModel, IncrementalModel, ModelSpec, SweepStrategy,
};
use crate::error::TuneError;

/// `canopy-rf` forests: per-split feature sampling, soft voting.
///
/// Batch fits and warm-start growth draw tree seeds from the same stream,
/// so both sweep strategies give the same curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    fn config(spec: &ModelSpec, n_trees: usize) -> Result<RandomForestConfig, TuneError> {
        Ok(RandomForestConfig::new(n_trees)?
            .with_max_features(spec.params.max_features)
            .with_min_samples_leaf(spec.params.min_samples_leaf)
            .with_criterion(spec.params.criterion)
            .with_seed(spec.seed))
    }
}

/// A fitted `canopy-rf` forest.
#[derive(Debug, Clone)]
pub struct NativeModel {
    forest: RandomForest,
}

impl EnsembleModel for NativeModel {
    fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    fn predict_first_n(&self, n: usize, data: &LabeledMatrix) -> Result<Vec<usize>, TuneError> {
        Ok(self.forest.predict_first_n(n, data.features())?)
    }

    fn staged_predict(&self, data: &LabeledMatrix) -> Result<Vec<Vec<usize>>, TuneError> {
        Ok(self.forest.staged_predict(data.features())?)
    }
}

/// A warm-start `canopy-rf` forest.
#[derive(Debug)]
pub struct NativeGrower {
    grower: ForestGrower,
}

impl EnsembleModel for NativeGrower {
    fn n_trees(&self) -> usize {
        self.grower.n_trees()
    }

    fn predict_first_n(&self, n: usize, data: &LabeledMatrix) -> Result<Vec<usize>, TuneError> {
        Ok(self.grower.forest().predict_first_n(n, data.features())?)
    }

    fn staged_predict(&self, data: &LabeledMatrix) -> Result<Vec<Vec<usize>>, TuneError> {
        Ok(self.grower.forest().staged_predict(data.features())?)
    }
}

impl IncrementalModel for NativeGrower {
    fn add_tree(&mut self) -> Result<(), TuneError> {
        self.grower.add_tree();
        Ok(())
    }
}

impl ClassifierBackend for NativeBackend {
    type Model = NativeModel;
    type Grower = NativeGrower;

    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    #[instrument(
        skip_all,
        fields(backend = "native", n_trees = spec.n_trees, n_samples = data.n_samples())
    )]
    fn fit(&self, spec: &ModelSpec, data: &LabeledMatrix) -> Result<NativeModel, TuneError> {
        spec.check(data.n_features())?;
        let forest = Self::config(spec, spec.n_trees)?.fit(data.features(), data.labels())?;
        debug!(params = %spec.params, "native forest fitted");
        Ok(NativeModel { forest })
    }

    fn start_incremental(
        &self,
        spec: &ModelSpec,
        data: &LabeledMatrix,
    ) -> Result<NativeGrower, TuneError> {
        spec.params.check(data.n_features())?;
        let grower = Self::config(spec, 1)?.grower(data.features(), data.labels())?;
        Ok(NativeGrower { grower })
    }

    fn preferred_strategy(&self) -> SweepStrategy {
        SweepStrategy::Batch
    }
}
