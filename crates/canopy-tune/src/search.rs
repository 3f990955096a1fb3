//! Cross-validated grid search on a bounded worker pool.

use std::time::{Duration, Instant};

use canopy_io::{LabeledMatrix, ScoreRow, SearchReport};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::backend::{BackendKind, ClassifierBackend, EnsembleModel, ModelSpec, accuracy};
use crate::error::TuneError;
use crate::folds::Folds;
use crate::grid::{HyperParams, ParamGrid};

/// Cross-validated score of one grid point.
#[derive(Debug, Clone, Serialize)]
pub struct CvRecord {
    pub params: HyperParams,
    pub mean_accuracy: f64,
    /// Population standard deviation over folds.
    pub std_accuracy: f64,
    pub fold_accuracies: Vec<f64>,
}

impl CvRecord {
    fn from_folds(params: HyperParams, fold_accuracies: Vec<f64>) -> Self {
        let k = fold_accuracies.len() as f64;
        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / k;
        let variance = fold_accuracies
            .iter()
            .map(|&a| (a - mean_accuracy).powi(2))
            .sum::<f64>()
            / k;
        Self {
            params,
            mean_accuracy,
            std_accuracy: variance.sqrt(),
            fold_accuracies,
        }
    }
}

/// Score table of one backend, one row per grid point in grid order.
#[derive(Debug, Clone)]
pub struct SearchResult {
    backend: BackendKind,
    records: Vec<CvRecord>,
    n_folds: usize,
    n_trees: usize,
    elapsed: Duration,
}

impl SearchResult {
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    #[must_use]
    pub fn records(&self) -> &[CvRecord] {
        &self.records
    }

    /// Record of a specific grid point.
    #[must_use]
    pub fn get(&self, params: &HyperParams) -> Option<&CvRecord> {
        self.records.iter().find(|r| &r.params == params)
    }

    /// Highest mean accuracy, earliest grid point on ties. For inspection
    /// only; the refit setting is always chosen by the caller.
    #[must_use]
    pub fn best(&self) -> Option<&CvRecord> {
        self.records.iter().fold(None, |best: Option<&CvRecord>, r| match best {
            Some(b) if b.mean_accuracy >= r.mean_accuracy => Some(b),
            _ => Some(r),
        })
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Wall-clock time from validation to the last aggregated row.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn report(&self) -> SearchReport {
        SearchReport {
            backend: self.backend.to_string(),
            n_folds: self.n_folds,
            n_trees: self.n_trees,
            elapsed_secs: self.elapsed.as_secs_f64(),
            rows: self
                .records
                .iter()
                .map(|r| ScoreRow {
                    max_features: r.params.max_features,
                    min_samples_leaf: r.params.min_samples_leaf,
                    criterion: r.params.criterion.to_string(),
                    mean_accuracy: r.mean_accuracy,
                    std_accuracy: r.std_accuracy,
                })
                .collect(),
            fold_accuracies: self.records.iter().map(|r| r.fold_accuracies.clone()).collect(),
        }
    }
}

/// Grid search configuration.
///
/// Construct via [`GridSearch::new`], then chain `with_*` methods.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    n_trees: usize,
    n_folds: usize,
    seed: u64,
    workers: Option<usize>,
}

impl GridSearch {
    /// Search `grid` with 100 trees per model, 4 folds, seed 1 and one
    /// worker per available core.
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            n_trees: 100,
            n_folds: 4,
            seed: 1,
            workers: None,
        }
    }

    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    #[must_use]
    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bound the pool to `workers` threads; `None` uses available parallelism.
    #[must_use]
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Everything that can be rejected without fitting a model.
    fn validate(&self, learn: &LabeledMatrix) -> Result<(Vec<HyperParams>, Folds), TuneError> {
        if self.grid.is_empty() {
            return Err(TuneError::EmptyGrid);
        }
        if self.n_trees == 0 {
            return Err(TuneError::InvalidTreeCount { n_trees: 0 });
        }
        if self.workers == Some(0) {
            return Err(TuneError::InvalidWorkerCount);
        }
        let points = self.grid.points();
        for p in &points {
            p.check(learn.n_features())?;
        }
        let folds = Folds::stratified(learn, self.n_folds, self.seed)?;
        Ok((points, folds))
    }

    /// Score every grid point with `backend` by stratified k-fold CV on `learn`.
    ///
    /// Each (grid point, fold) pair is one job on a bounded rayon pool; the
    /// model in fold `f` is seeded with `seed + f`. Scores are aggregated
    /// after all jobs finish.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TuneError::EmptyGrid`] | no grid points |
    /// | [`TuneError::InfeasibleParams`] | a point cannot be trained on `learn` |
    /// | [`TuneError::InvalidTreeCount`] | `n_trees == 0` |
    /// | [`TuneError::InvalidWorkerCount`] | `workers == Some(0)` |
    /// | [`TuneError::InvalidFoldCount`] | `n_folds < 2` |
    /// | [`TuneError::TooFewSamplesForFolds`] | the learn set has fewer rows than folds |
    /// | [`TuneError::ThreadPool`] | the pool cannot be built |
    /// | backend errors | a fit or prediction failed |
    #[instrument(
        skip_all,
        fields(backend = %backend.kind(), grid = self.grid.len(), n_folds = self.n_folds)
    )]
    pub fn run<B: ClassifierBackend>(
        &self,
        backend: &B,
        learn: &LabeledMatrix,
    ) -> Result<SearchResult, TuneError> {
        let started = Instant::now();
        let (points, folds) = self.validate(learn)?;

        let fold_data: Vec<(LabeledMatrix, LabeledMatrix)> = (0..self.n_folds)
            .map(|f| {
                (
                    learn.subset(&folds.train_rows(f)),
                    learn.subset(&folds.valid_rows(f)),
                )
            })
            .collect();
        let jobs: Vec<(usize, usize)> = (0..points.len())
            .flat_map(|p| (0..self.n_folds).map(move |f| (p, f)))
            .collect();

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.workers {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        info!(
            n_jobs = jobs.len(),
            workers = pool.current_num_threads(),
            "starting grid search"
        );

        let scores: Vec<f64> = pool.install(|| {
            jobs.par_iter()
                .map(|&(p, f)| {
                    let seed = self.seed.wrapping_add(f as u64);
                    let spec = ModelSpec::new(points[p], self.n_trees, seed);
                    let (train, valid) = &fold_data[f];
                    let model = backend.fit(&spec, train)?;
                    let acc = accuracy(&model.predict(valid)?, valid)?;
                    debug!(params = %points[p], fold = f, accuracy = acc, "fold scored");
                    Ok(acc)
                })
                .collect::<Result<Vec<f64>, TuneError>>()
        })?;

        let records: Vec<CvRecord> = points
            .iter()
            .zip(scores.chunks(self.n_folds))
            .map(|(&params, accs)| CvRecord::from_folds(params, accs.to_vec()))
            .collect();

        let elapsed = started.elapsed();
        info!(
            backend = %backend.kind(),
            elapsed_secs = elapsed.as_secs_f64(),
            best = records
                .iter()
                .map(|r| r.mean_accuracy)
                .fold(f64::NEG_INFINITY, f64::max),
            "grid search complete"
        );

        Ok(SearchResult {
            backend: backend.kind(),
            records,
            n_folds: self.n_folds,
            n_trees: self.n_trees,
            elapsed,
        })
    }
}
