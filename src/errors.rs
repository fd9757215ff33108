use crate::models::PartitionTask;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// What went wrong while reading a sequence database.
#[derive(Debug, Error)]
pub enum DataSourceErrorKind {
    #[error("could not open: {0}")]
    Open(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("timed out after {waited:?} waiting for workers {pending:?}")]
    TimedOut { waited: Duration, pending: Vec<usize> },
}

#[derive(Debug, Error)]
#[error("{} ({source_name}): {kind}", partition_label(.partition))]
pub struct DataSourceError {
    pub source_name: String,
    pub partition: Option<PartitionTask>,
    pub kind: DataSourceErrorKind,
}

fn partition_label(partition: &Option<PartitionTask>) -> String {
    match partition {
        Some(task) => task.to_string(),
        None => "driver".to_string(),
    }
}

impl DataSourceError {
    pub fn new(source_name: impl Into<String>, kind: DataSourceErrorKind) -> Self {
        Self {
            source_name: source_name.into(),
            partition: None,
            kind,
        }
    }

    /// Attributes the error to the worker that hit it.
    pub fn in_partition(mut self, task: PartitionTask) -> Self {
        self.partition = Some(task);
        self
    }
}

#[derive(Debug, Error)]
pub enum PepSeekError {
    #[error("data source error in {0}")]
    DataSource(#[from] DataSourceError),

    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error(
        "partial result: {received} of {expected} partitions returned, missing workers {missing:?}"
    )]
    PartialResult {
        expected: usize,
        received: usize,
        missing: Vec<usize>,
    },

    #[error("scan cancelled")]
    Cancelled,

    #[error("could not ingest peptides from {path:?}: {reason}")]
    Ingest { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PepSeekError {
    /// True for the errors a worker reports after being told to stop.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PepSeekError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PepSeekError>;
