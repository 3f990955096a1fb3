//! Delimited table reader with gzip detection and full input validation.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::Dataset;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Which columns of the table to use and how cells are separated.
#[derive(Debug, Clone)]
pub struct Schema {
    label_column: String,
    feature_columns: Option<Vec<String>>,
    delimiter: u8,
}

impl Schema {
    /// Use `label_column` as the label and every other column as a feature,
    /// comma-delimited.
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            feature_columns: None,
            delimiter: b',',
        }
    }

    /// Restrict features to these columns, in this order.
    #[must_use]
    pub fn with_features(mut self, columns: Vec<String>) -> Self {
        self.feature_columns = Some(columns);
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

/// Reads a labeled table from a plain or gzip-compressed delimited file.
///
/// Compression is detected from the first two bytes, not the extension.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed record or corrupt gzip stream |
/// | [`IoError::EmptyDataset`] | Zero data rows after the header |
/// | [`IoError::MissingLabelColumn`] | Label column not in the header |
/// | [`IoError::MissingFeatureColumn`] | Requested feature column not in the header |
/// | [`IoError::NoFeatureColumns`] | Nothing left to use as a feature |
/// | [`IoError::InconsistentRowLength`] | Row has a different cell count than the header |
/// | [`IoError::EmptyLabel`] | Blank label cell |
/// | [`IoError::NonNumericValue`] | Feature cell does not parse as a float |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN or infinite |
pub struct DatasetReader {
    path: PathBuf,
    schema: Schema,
}

impl DatasetReader {
    pub fn new(path: &Path, schema: Schema) -> Self {
        Self {
            path: path.to_path_buf(),
            schema,
        }
    }

    fn open(&self) -> Result<Box<dyn Read>, IoError> {
        let file = File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut buffered = BufReader::new(file);
        let head = buffered.fill_buf().map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        if head.starts_with(&GZIP_MAGIC) {
            debug!("gzip stream detected");
            Ok(Box::new(MultiGzDecoder::new(buffered)))
        } else {
            Ok(Box::new(buffered))
        }
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            line: e.position().map_or(0, |p| p.line()),
            source: e,
        }
    }

    /// Column positions of the label and of each feature.
    fn resolve_columns(
        &self,
        header: &csv::StringRecord,
    ) -> Result<(usize, Vec<(usize, String)>), IoError> {
        let position = |name: &str| header.iter().position(|h| h.trim() == name);
        let label = position(&self.schema.label_column).ok_or_else(|| {
            IoError::MissingLabelColumn {
                path: self.path.clone(),
                column: self.schema.label_column.clone(),
            }
        })?;

        let features: Vec<(usize, String)> = match &self.schema.feature_columns {
            Some(columns) => columns
                .iter()
                .map(|c| {
                    position(c).map(|i| (i, c.clone())).ok_or_else(|| {
                        IoError::MissingFeatureColumn {
                            path: self.path.clone(),
                            column: c.clone(),
                        }
                    })
                })
                .collect::<Result<_, _>>()?,
            None => header
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != label)
                .map(|(i, h)| (i, h.trim().to_string()))
                .collect(),
        };
        if features.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        Ok((label, features))
    }

    /// Read and validate the table, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        // flexible(true) so a short row reaches our own length check instead
        // of surfacing as a generic CSV error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.schema.delimiter)
            .from_reader(self.open()?);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();
        let (label_col, feature_cols) = self.resolve_columns(&header)?;
        debug!(expected_cols, n_features = feature_cols.len(), "read header");

        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let label = record[label_col].trim();
            if label.is_empty() {
                return Err(IoError::EmptyLabel {
                    path: self.path.clone(),
                    row_index,
                });
            }

            let mut row = Vec::with_capacity(feature_cols.len());
            for (col, name) in &feature_cols {
                let raw = record[*col].trim();
                let value: f64 = raw.parse().map_err(|_| IoError::NonNumericValue {
                    path: self.path.clone(),
                    column: name.clone(),
                    row_index,
                    raw: raw.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(IoError::NonFiniteValue {
                        column: name.clone(),
                        row_index,
                    });
                }
                row.push(value);
            }
            features.push(row);
            labels.push(label.to_string());
        }

        if features.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let names = feature_cols.into_iter().map(|(_, name)| name).collect();
        let dataset =
            Dataset::from_parts(self.schema.label_column.clone(), names, features, labels)?;
        info!(
            n_samples = dataset.n_samples(),
            n_features = dataset.n_features(),
            n_classes = dataset.n_classes(),
            "dataset loaded"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoErrorKind;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = "x1,label,x2\n0.5,b,1.0\n1.5,a,2.0\n2.5,b,3.0\n";

    fn write_plain(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn write_gzip(content: &str) -> NamedTempFile {
        let f = NamedTempFile::new().unwrap();
        let mut enc = GzEncoder::new(f.reopen().unwrap(), Compression::default());
        enc.write_all(content.as_bytes()).unwrap();
        enc.finish().unwrap();
        f
    }

    fn read(f: &NamedTempFile, schema: Schema) -> Result<Dataset, IoError> {
        DatasetReader::new(f.path(), schema).read()
    }

    #[test]
    fn every_other_column_is_a_feature() {
        let ds = read(&write_plain(TABLE), Schema::new("label")).unwrap();
        assert_eq!(ds.feature_names(), ["x1", "x2"]);
        assert_eq!(ds.features()[1], vec![1.5, 2.0]);
        assert_eq!(ds.classes(), ["a", "b"]);
        assert_eq!(ds.labels(), [1, 0, 1]);
    }

    #[test]
    fn gzip_and_plain_load_identically() {
        let plain = read(&write_plain(TABLE), Schema::new("label")).unwrap();
        let gz = read(&write_gzip(TABLE), Schema::new("label")).unwrap();
        assert_eq!(plain.features(), gz.features());
        assert_eq!(plain.labels(), gz.labels());
    }

    #[test]
    fn explicit_features_in_requested_order() {
        let schema = Schema::new("label").with_features(vec!["x2".into(), "x1".into()]);
        let ds = read(&write_plain(TABLE), schema).unwrap();
        assert_eq!(ds.feature_names(), ["x2", "x1"]);
        assert_eq!(ds.features()[0], vec![1.0, 0.5]);
    }

    #[test]
    fn custom_delimiter() {
        let schema = Schema::new("label").with_delimiter(b';');
        let ds = read(&write_plain("label;v\nq;1\nr;2\n"), schema).unwrap();
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.n_features(), 1);
    }

    #[test]
    fn missing_file_is_io_kind() {
        let err = DatasetReader::new(Path::new("/nonexistent/data.csv.gz"), Schema::new("label"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
        assert_eq!(err.kind(), IoErrorKind::Io);
    }

    #[test]
    fn header_only_is_empty() {
        let err = read(&write_plain("x,label\n"), Schema::new("label")).unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn missing_label_is_schema_kind() {
        let err = read(&write_plain(TABLE), Schema::new("class")).unwrap_err();
        assert!(matches!(err, IoError::MissingLabelColumn { ref column, .. } if column == "class"));
        assert_eq!(err.kind(), IoErrorKind::Schema);
    }

    #[test]
    fn missing_feature_column() {
        let schema = Schema::new("label").with_features(vec!["x9".into()]);
        let err = read(&write_plain(TABLE), schema).unwrap_err();
        assert!(matches!(err, IoError::MissingFeatureColumn { .. }));
    }

    #[test]
    fn label_only_table_has_no_features() {
        let err = read(&write_plain("label\na\n"), Schema::new("label")).unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn non_numeric_names_the_column() {
        let err = read(&write_plain("x1,label\n0.5,a\nfoo,b\n"), Schema::new("label")).unwrap_err();
        assert!(matches!(
            err,
            IoError::NonNumericValue { ref column, row_index: 1, .. } if column == "x1"
        ));
        assert_eq!(err.kind(), IoErrorKind::Schema);
    }

    #[test]
    fn non_finite_rejected() {
        let err = read(&write_plain("x1,label\ninf,a\n"), Schema::new("label")).unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { .. }));
    }

    #[test]
    fn short_row_rejected() {
        let path = write_plain("x1,x2,label\n1,2,a\n1,b\n");
        let err = read(&path, Schema::new("label")).unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength { row_index: 1, expected: 3, got: 2, .. }
        ));
    }

    #[test]
    fn blank_label_rejected() {
        let err = read(&write_plain("x1,label\n1, \n"), Schema::new("label")).unwrap_err();
        assert!(matches!(err, IoError::EmptyLabel { row_index: 0, .. }));
    }
}
