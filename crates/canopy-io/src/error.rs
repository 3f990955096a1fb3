//! I/O error types for canopy-io.

use std::path::PathBuf;

/// Coarse classification of an [`IoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    /// The bytes could not be obtained or written: missing file, corrupt
    /// stream, malformed CSV, unwritable output.
    Io,
    /// The bytes were read but do not fit the expected table shape.
    Schema,
}

/// Errors from dataset loading, validation and result writing.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("cannot open {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser or the gzip decoder fails mid-file.
    #[error("CSV read error in {path} at line {line}")]
    CsvParse {
        /// Path to the input file.
        path: PathBuf,
        /// One-based line where the error occurred, 0 if unknown.
        line: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the file has a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the input file.
        path: PathBuf,
    },

    /// Returned when the label column is not in the header.
    #[error("label column \"{column}\" not found in {path}")]
    MissingLabelColumn {
        /// Path to the input file.
        path: PathBuf,
        /// Requested label column.
        column: String,
    },

    /// Returned when an explicitly requested feature column is not in the header.
    #[error("feature column \"{column}\" not found in {path}")]
    MissingFeatureColumn {
        /// Path to the input file.
        path: PathBuf,
        /// Requested feature column.
        column: String,
    },

    /// Returned when the table has no column left to use as a feature.
    #[error("no feature columns in {path}")]
    NoFeatureColumns {
        /// Path to the input file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of cells than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} cells, expected {expected}")]
    InconsistentRowLength {
        /// Path to the input file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Number of header columns.
        expected: usize,
        /// Number of cells in this row.
        got: usize,
    },

    /// Returned when a label cell is blank.
    #[error("empty label in {path}: row {row_index}")]
    EmptyLabel {
        /// Path to the input file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
    },

    /// Returned when a feature cell does not parse as a number.
    #[error("non-numeric value in {path}: column \"{column}\", row {row_index}, raw value \"{raw}\"")]
    NonNumericValue {
        /// Path to the input file.
        path: PathBuf,
        /// Feature column name.
        column: String,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// The cell as read.
        raw: String,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value in column \"{column}\", row {row_index}")]
    NonFiniteValue {
        /// Feature column name.
        column: String,
        /// Zero-based row index.
        row_index: usize,
    },

    /// Returned when an in-memory table has rows of the wrong width.
    #[error("row {row_index} has {got} features, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row_index: usize,
        /// Number of feature names.
        expected: usize,
        /// Number of values in this row.
        got: usize,
    },

    /// Returned when feature rows and labels differ in count.
    #[error("{n_rows} feature rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a JSON artifact cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact cannot be encoded as JSON.
    #[error("cannot encode {path} as JSON")]
    Encode {
        /// Destination path.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a CSV table cannot be written.
    #[error("cannot write CSV table {path}")]
    CsvWrite {
        /// Destination path.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

impl IoError {
    /// Whether the failure is about reading/writing bytes or about their shape.
    #[must_use]
    pub fn kind(&self) -> IoErrorKind {
        match self {
            IoError::FileNotFound { .. }
            | IoError::CsvParse { .. }
            | IoError::EmptyDataset { .. }
            | IoError::OutputDirCreate { .. }
            | IoError::WriteFile { .. }
            | IoError::Encode { .. }
            | IoError::CsvWrite { .. } => IoErrorKind::Io,
            IoError::MissingLabelColumn { .. }
            | IoError::MissingFeatureColumn { .. }
            | IoError::NoFeatureColumns { .. }
            | IoError::InconsistentRowLength { .. }
            | IoError::EmptyLabel { .. }
            | IoError::NonNumericValue { .. }
            | IoError::NonFiniteValue { .. }
            | IoError::RaggedRow { .. }
            | IoError::LabelCountMismatch { .. }
            | IoError::InvalidExperimentName { .. } => IoErrorKind::Schema,
        }
    }
}
