//! Serializable artifact shapes.
//!
//! These are plain data so the writer stays independent of the crates that
//! produce the numbers. Row types are flat so they also serialize as CSV.

use serde::Serialize;

/// One grid point's cross-validated score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub max_features: usize,
    pub min_samples_leaf: usize,
    pub criterion: String,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
}

/// Score table of one backend's grid search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub backend: String,
    pub n_folds: usize,
    pub n_trees: usize,
    pub elapsed_secs: f64,
    pub rows: Vec<ScoreRow>,
    /// `fold_accuracies[i]` belongs to `rows[i]`.
    pub fold_accuracies: Vec<Vec<f64>>,
}

/// Test accuracy with the first `tree_count` trees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveRow {
    pub tree_count: usize,
    pub accuracy: f64,
}

/// Per-class scores of the full refit ensemble on the test set.
#[derive(Debug, Clone, Serialize)]
pub struct ClassScore {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Accuracy-versus-ensemble-size curve of one backend.
#[derive(Debug, Clone, Serialize)]
pub struct CurveReport {
    pub backend: String,
    pub strategy: String,
    pub max_features: usize,
    pub min_samples_leaf: usize,
    pub criterion: String,
    pub points: Vec<CurveRow>,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub class_metrics: Vec<ClassScore>,
}

/// Row counts of one class in each partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionCounts {
    pub class: String,
    pub learn: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<usize>,
    pub test: usize,
}

/// Outcome of the stratified split.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub scheme: String,
    pub seed: u64,
    pub n_samples: usize,
    pub classes: Vec<PartitionCounts>,
}
