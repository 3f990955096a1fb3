//! Refit with a fixed setting and trace test accuracy against ensemble size.

use canopy_io::{ClassScore, CurveReport, CurveRow, LabeledMatrix};
use canopy_rf::ConfusionMatrix;
use tracing::{debug, info, instrument};

use crate::backend::{
    BackendKind, ClassifierBackend, EnsembleModel, IncrementalModel, ModelSpec, SweepStrategy,
    accuracy,
};
use crate::error::TuneError;
use crate::grid::HyperParams;

/// Test accuracy with the first `tree_count` trees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CurvePoint {
    pub tree_count: usize,
    pub accuracy: f64,
}

/// One backend's accuracy-versus-ensemble-size curve, `tree_count` 1..=N_max.
#[derive(Debug, Clone)]
pub struct AccuracyCurve {
    backend: BackendKind,
    strategy: SweepStrategy,
    params: HyperParams,
    points: Vec<CurvePoint>,
    confusion: ConfusionMatrix,
}

impl AccuracyCurve {
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Strategy actually used, after resolving `auto`.
    #[must_use]
    pub fn strategy(&self) -> SweepStrategy {
        self.strategy
    }

    #[must_use]
    pub fn params(&self) -> HyperParams {
        self.params
    }

    #[must_use]
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Accuracy of the full ensemble.
    #[must_use]
    pub fn final_accuracy(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.accuracy)
    }

    /// Test-set confusion matrix of the full ensemble.
    #[must_use]
    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    /// Artifact form; `classes[i]` names class index `i`.
    #[must_use]
    pub fn report(&self, classes: &[String]) -> CurveReport {
        let class_name = |i: usize| classes.get(i).cloned().unwrap_or_else(|| i.to_string());
        CurveReport {
            backend: self.backend.to_string(),
            strategy: self.strategy.to_string(),
            max_features: self.params.max_features,
            min_samples_leaf: self.params.min_samples_leaf,
            criterion: self.params.criterion.to_string(),
            points: self
                .points
                .iter()
                .map(|p| CurveRow {
                    tree_count: p.tree_count,
                    accuracy: p.accuracy,
                })
                .collect(),
            confusion_matrix: self.confusion.rows().to_vec(),
            class_metrics: self
                .confusion
                .class_metrics()
                .into_iter()
                .map(|m| ClassScore {
                    class: class_name(m.class),
                    precision: m.precision,
                    recall: m.recall,
                    f1: m.f1,
                    support: m.support,
                })
                .collect(),
        }
    }
}

/// Refit-and-sweep configuration.
///
/// Construct via [`EnsembleSweep::new`], then chain `with_*` methods.
#[derive(Debug, Clone)]
pub struct EnsembleSweep {
    params: HyperParams,
    max_trees: usize,
    seed: u64,
    strategy: Option<SweepStrategy>,
}

impl EnsembleSweep {
    /// Sweep 1..=50 trees under seed 1 with the backend's preferred strategy.
    pub fn new(params: HyperParams) -> Self {
        Self {
            params,
            max_trees: 50,
            seed: 1,
            strategy: None,
        }
    }

    #[must_use]
    pub fn with_max_trees(mut self, max_trees: usize) -> Self {
        self.max_trees = max_trees;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Force a strategy; `None` defers to the backend.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Option<SweepStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Train on `learn` and score every ensemble size on `test`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TuneError::InvalidTreeCount`] | `max_trees == 0` |
    /// | [`TuneError::InfeasibleParams`] | the setting cannot be trained on `learn` |
    /// | [`TuneError::EmptyPartition`] | `test` has no rows |
    /// | backend errors | a fit or prediction failed |
    #[instrument(skip_all, fields(backend = %backend.kind(), max_trees = self.max_trees))]
    pub fn run<B: ClassifierBackend>(
        &self,
        backend: &B,
        learn: &LabeledMatrix,
        test: &LabeledMatrix,
    ) -> Result<AccuracyCurve, TuneError> {
        let spec = ModelSpec::new(self.params, self.max_trees, self.seed);
        spec.check(learn.n_features())?;
        if test.is_empty() {
            return Err(TuneError::EmptyPartition { partition: "test" });
        }
        let strategy = self.strategy.unwrap_or_else(|| backend.preferred_strategy());
        info!(params = %self.params, %strategy, "refitting for ensemble-size sweep");

        let (points, full) = match strategy {
            SweepStrategy::Batch => Self::batch(backend, &spec, learn, test)?,
            SweepStrategy::Incremental => Self::incremental(backend, &spec, learn, test)?,
        };
        let confusion = ConfusionMatrix::from_predictions(test.labels(), &full, test.n_classes())?;

        let curve = AccuracyCurve {
            backend: backend.kind(),
            strategy,
            params: self.params,
            points,
            confusion,
        };
        info!(final_accuracy = curve.final_accuracy(), "sweep complete");
        Ok(curve)
    }

    /// One fit of `N_max` trees, every prefix scored from staged votes.
    fn batch<B: ClassifierBackend>(
        backend: &B,
        spec: &ModelSpec,
        learn: &LabeledMatrix,
        test: &LabeledMatrix,
    ) -> Result<(Vec<CurvePoint>, Vec<usize>), TuneError> {
        let model = backend.fit(spec, learn)?;
        let mut stages = model.staged_predict(test)?;
        let points = stages
            .iter()
            .enumerate()
            .map(|(k, predicted)| {
                Ok(CurvePoint {
                    tree_count: k + 1,
                    accuracy: accuracy(predicted, test)?,
                })
            })
            .collect::<Result<Vec<_>, TuneError>>()?;
        let full = stages.pop().ok_or(TuneError::NotFitted)?;
        Ok((points, full))
    }

    /// Grow one tree at a time and score the whole ensemble after each.
    fn incremental<B: ClassifierBackend>(
        backend: &B,
        spec: &ModelSpec,
        learn: &LabeledMatrix,
        test: &LabeledMatrix,
    ) -> Result<(Vec<CurvePoint>, Vec<usize>), TuneError> {
        let mut grower = backend.start_incremental(spec, learn)?;
        let mut points = Vec::with_capacity(spec.n_trees);
        let mut full = Vec::new();
        for tree_count in 1..=spec.n_trees {
            grower.add_tree()?;
            full = grower.predict(test)?;
            let acc = accuracy(&full, test)?;
            debug!(tree_count, accuracy = acc, "tree added");
            points.push(CurvePoint {
                tree_count,
                accuracy: acc,
            });
        }
        Ok((points, full))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{LinfaBackend, NativeBackend};
    use canopy_rf::Criterion;

    fn matrix(n: usize, offset: usize) -> LabeledMatrix {
        let labels: Vec<usize> = (0..n).map(|i| (i + offset) % 2).collect();
        let features = labels
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                vec![
                    c as f64 * 2.0 + ((i * 13) % 7) as f64 * 0.2,
                    ((i * 5) % 9) as f64,
                ]
            })
            .collect();
        LabeledMatrix::new(features, labels, vec!["u".into(), "v".into()], 2).unwrap()
    }

    fn sweep(max_trees: usize) -> EnsembleSweep {
        EnsembleSweep::new(HyperParams::new(1, 2, Criterion::Gini))
            .with_max_trees(max_trees)
            .with_seed(4)
    }

    #[test]
    fn curve_has_one_point_per_size() {
        let curve = sweep(12).run(&NativeBackend, &matrix(60, 0), &matrix(20, 1)).unwrap();
        assert_eq!(curve.strategy(), SweepStrategy::Batch);
        let counts: Vec<usize> = curve.points().iter().map(|p| p.tree_count).collect();
        assert_eq!(counts, (1..=12).collect::<Vec<_>>());
        assert!(curve.points().iter().all(|p| (0.0..=1.0).contains(&p.accuracy)));
        assert_eq!(curve.confusion().total(), 20);
    }

    #[test]
    fn native_strategies_coincide() {
        let (learn, test) = (matrix(50, 0), matrix(20, 1));
        let batch = sweep(8)
            .with_strategy(Some(SweepStrategy::Batch))
            .run(&NativeBackend, &learn, &test)
            .unwrap();
        let incremental = sweep(8)
            .with_strategy(Some(SweepStrategy::Incremental))
            .run(&NativeBackend, &learn, &test)
            .unwrap();
        assert_eq!(batch.points(), incremental.points());
        assert_eq!(batch.confusion(), incremental.confusion());
    }

    #[test]
    fn linfa_defaults_to_incremental() {
        let curve = sweep(5).run(&LinfaBackend, &matrix(40, 0), &matrix(10, 0)).unwrap();
        assert_eq!(curve.strategy(), SweepStrategy::Incremental);
        assert_eq!(curve.points().len(), 5);
        let report = curve.report(&["no".to_string(), "yes".to_string()]);
        assert_eq!(report.class_metrics[1].class, "yes");
        assert_eq!(report.points[4].tree_count, 5);
    }

    #[test]
    fn linfa_strategies_coincide() {
        let (learn, test) = (matrix(40, 0), matrix(16, 1));
        let batch = sweep(6)
            .with_strategy(Some(SweepStrategy::Batch))
            .run(&LinfaBackend, &learn, &test)
            .unwrap();
        let incremental = sweep(6).run(&LinfaBackend, &learn, &test).unwrap();
        assert_eq!(batch.points(), incremental.points());
    }

    #[test]
    fn zero_trees_rejected() {
        let err = sweep(0).run(&NativeBackend, &matrix(20, 0), &matrix(4, 0)).unwrap_err();
        assert!(matches!(err, TuneError::InvalidTreeCount { n_trees: 0 }));
    }

    #[test]
    fn empty_test_set_rejected() {
        let names = vec!["u".into(), "v".into()];
        let empty = LabeledMatrix::new(Vec::new(), Vec::new(), names, 2).unwrap();
        let err = sweep(3).run(&LinfaBackend, &matrix(20, 0), &empty).unwrap_err();
        assert!(matches!(err, TuneError::EmptyPartition { partition: "test" }));
    }
}
