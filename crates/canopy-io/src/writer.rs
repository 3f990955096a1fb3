//! JSON and CSV writer for search tables, accuracy curves and split summaries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;
use crate::report::{CurveReport, SearchReport, SplitReport};

/// Writes run artifacts into one output directory.
///
/// Creates the output directory on construction if it does not exist.
/// Files are named `{experiment}_{backend}_search.{json,csv}`,
/// `{experiment}_{backend}_curve.{json,csv}` and `{experiment}_split.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

/// Every JSON artifact carries the experiment name next to its body.
#[derive(Serialize)]
struct Artifact<'a, T: Serialize> {
    experiment: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{output_dir}/{experiment}_{stem}`.
    #[must_use]
    pub fn artifact_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{stem}", self.experiment.as_str()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, body: &T) -> Result<(), IoError> {
        let artifact = Artifact {
            experiment: self.experiment.as_str(),
            body,
        };
        let json = serde_json::to_string_pretty(&artifact).map_err(|e| IoError::Encode {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn write_csv<T: Serialize>(&self, path: &Path, rows: &[T]) -> Result<(), IoError> {
        let csv_error = |e| IoError::CsvWrite {
            path: path.to_path_buf(),
            source: e,
        };
        let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
        for row in rows {
            wtr.serialize(row).map_err(csv_error)?;
        }
        wtr.flush().map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write a grid-search score table as JSON (with per-fold scores) and CSV.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`], [`IoError::CsvWrite`] or
    /// [`IoError::Encode`] if a file cannot be produced.
    #[instrument(skip_all, fields(backend = %report.backend))]
    pub fn write_search(&self, report: &SearchReport) -> Result<(), IoError> {
        let stem = format!("{}_search", report.backend);
        let json_path = self.artifact_path(&format!("{stem}.json"));
        self.write_json(&json_path, report)?;
        self.write_csv(&self.artifact_path(&format!("{stem}.csv")), &report.rows)?;
        info!(path = %json_path.display(), rows = report.rows.len(), "search table written");
        Ok(())
    }

    /// Write an accuracy curve as JSON (with test-set metrics) and CSV.
    ///
    /// # Errors
    ///
    /// Same as [`write_search`](Self::write_search).
    #[instrument(skip_all, fields(backend = %report.backend))]
    pub fn write_curve(&self, report: &CurveReport) -> Result<(), IoError> {
        let stem = format!("{}_curve", report.backend);
        let json_path = self.artifact_path(&format!("{stem}.json"));
        self.write_json(&json_path, report)?;
        self.write_csv(&self.artifact_path(&format!("{stem}.csv")), &report.points)?;
        info!(path = %json_path.display(), points = report.points.len(), "accuracy curve written");
        Ok(())
    }

    /// Write per-class partition counts to `{experiment}_split.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] or [`IoError::Encode`].
    #[instrument(skip_all)]
    pub fn write_split(&self, report: &SplitReport) -> Result<(), IoError> {
        let path = self.artifact_path("split.json");
        self.write_json(&path, report)?;
        info!(path = %path.display(), "split summary written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CurveRow, PartitionCounts, ScoreRow};
    use tempfile::TempDir;

    fn writer(dir: &TempDir, name: &str) -> ResultWriter {
        ResultWriter::new(dir.path(), ExperimentName::new(name.into()).unwrap()).unwrap()
    }

    fn read_json(path: PathBuf) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn search_report() -> SearchReport {
        let row = |max_features, min_samples_leaf, mean| ScoreRow {
            max_features,
            min_samples_leaf,
            criterion: "gini".into(),
            mean_accuracy: mean,
            std_accuracy: 0.01,
        };
        SearchReport {
            backend: "native".into(),
            n_folds: 4,
            n_trees: 100,
            elapsed_secs: 1.25,
            rows: vec![row(5, 2, 0.9), row(7, 5, 0.8)],
            fold_accuracies: vec![vec![0.9; 4], vec![0.8; 4]],
        }
    }

    #[test]
    fn search_json_and_csv() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, "exp");
        w.write_search(&search_report()).unwrap();

        let json = read_json(dir.path().join("exp_native_search.json"));
        assert_eq!(json["experiment"], "exp");
        assert_eq!(json["n_folds"], 4);
        assert_eq!(json["rows"].as_array().unwrap().len(), 2);
        assert_eq!(json["fold_accuracies"][1].as_array().unwrap().len(), 4);

        let csv = fs::read_to_string(dir.path().join("exp_native_search.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("max_features,min_samples_leaf,criterion,mean_accuracy,std_accuracy")
        );
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn curve_csv_has_one_line_per_point() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, "c");
        let report = CurveReport {
            backend: "linfa".into(),
            strategy: "incremental".into(),
            max_features: 3,
            min_samples_leaf: 1,
            criterion: "entropy".into(),
            points: (1..=5)
                .map(|n| CurveRow { tree_count: n, accuracy: 0.5 + n as f64 / 100.0 })
                .collect(),
            confusion_matrix: vec![vec![3, 1], vec![0, 4]],
            class_metrics: Vec::new(),
        };
        w.write_curve(&report).unwrap();

        let csv = fs::read_to_string(dir.path().join("c_linfa_curve.csv")).unwrap();
        assert_eq!(csv.lines().next(), Some("tree_count,accuracy"));
        assert_eq!(csv.lines().count(), 6);
        let json = read_json(dir.path().join("c_linfa_curve.json"));
        assert_eq!(json["strategy"], "incremental");
        assert_eq!(json["points"][4]["tree_count"], 5);
    }

    #[test]
    fn split_omits_valid_for_holdout() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, "s");
        let report = SplitReport {
            scheme: "holdout".into(),
            seed: 1,
            n_samples: 10,
            classes: vec![PartitionCounts {
                class: "a".into(),
                learn: 8,
                valid: None,
                test: 2,
            }],
        };
        w.write_split(&report).unwrap();
        let json = read_json(w.artifact_path("split.json"));
        assert_eq!(json["classes"][0]["learn"], 8);
        assert!(json["classes"][0].get("valid").is_none());
    }

    #[test]
    fn creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let w = ResultWriter::new(&nested, ExperimentName::new("n".into()).unwrap()).unwrap();
        w.write_search(&search_report()).unwrap();
        assert!(nested.join("n_native_search.csv").exists());
    }
}
