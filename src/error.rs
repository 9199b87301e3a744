use crate::batch::BatchStatus;
use crate::records::{Field, SourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{source_kind} workbook has no sheet named '{sheet}'")]
    SheetNotFound {
        source_kind: SourceKind,
        sheet: String,
    },

    #[error("{source_kind} sheet '{sheet}' has no recognisable header row")]
    HeaderNotFound {
        source_kind: SourceKind,
        sheet: String,
    },

    #[error("Workbook contains no sheets")]
    EmptyWorkbook,

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("{source_kind} record with key '{key}' already exists")]
    DuplicateKey { source_kind: SourceKind, key: String },

    #[error("Upload batch not found: {0}")]
    BatchNotFound(String),

    #[error("Invalid batch transition from {from} to {to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    #[error("Batch {batch_id} failed: {message}")]
    BatchFailed { batch_id: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::Error> for ReportError {
    fn from(err: calamine::Error) -> Self {
        ReportError::Workbook(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Row-level failure. Never escapes a parser; it is counted and the row skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("required field '{0}' is missing")]
    MissingField(Field),

    #[error("derived field '{0}' is not a finite number")]
    NonFinite(Field),
}
