use thiserror::Error;

/// Error kinds surfaced by the import pipeline.
///
/// Skip/duplicate accounting is not an error: reconciliation counts those
/// rows in the summaries so they stay auditable, and only hard failures
/// (unreadable file, failed transaction) propagate here.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to parse file: {0}")]
    Parse(String),
    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("snapshot read failed: {0}")]
    Read(sqlx::Error),
    #[error("commit failed: {0}")]
    Commit(#[from] sqlx::Error),
}
