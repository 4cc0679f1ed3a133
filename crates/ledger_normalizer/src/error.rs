use std::path::PathBuf;

use thiserror::Error;

use crate::report::EntryKind;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source file {path} is unreadable: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Source file {path} has no date column; header was {header:?}")]
    NoDateColumn { path: PathBuf, header: Vec<String> },

    #[error("Normalized tables disagree on schema: {left:?} vs {right:?}")]
    SchemaMismatch { left: Vec<String>, right: Vec<String> },

    #[error("Failed to render table: {0}")]
    Render(#[from] csv::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Failures that drop a single row. Counted, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("Unrecognized date '{0}'")]
    DateParse(String),

    #[error("Row has no content")]
    EmptyRow,

    #[error("Not a transaction row ({0})")]
    NonTransaction(EntryKind),
}
