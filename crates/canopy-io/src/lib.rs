//! Dataset loading, validation and artifact writing for the canopy pipeline.

mod domain;
mod error;
mod reader;
mod report;
mod writer;

pub use domain::{Dataset, ExperimentName, LabeledMatrix};
pub use error::{IoError, IoErrorKind};
pub use reader::{DatasetReader, Schema};
pub use report::{
    ClassScore, CurveReport, CurveRow, PartitionCounts, ScoreRow, SearchReport, SplitReport,
};
pub use writer::ResultWriter;
