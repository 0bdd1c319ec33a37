use super::config::ConfigError;
use crate::core::io::RecordError;
use crate::core::models::report::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single chemistry stage for a single candidate.
///
/// Stage failures never escape a candidate's pipeline: they are recorded as `NaN` and the
/// pipeline carries on.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Stage '{stage}' failed: {message}")]
    Failed { stage: Stage, message: String },

    #[error("Stage '{stage}' I/O error: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage '{stage}' produced unparsable output: {output:?}")]
    InvalidOutput { stage: Stage, output: String },

    #[error("Stage '{stage}' panicked: {message}")]
    Panicked { stage: Stage, message: String },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Failed { stage, .. }
            | StageError::Io { stage, .. }
            | StageError::InvalidOutput { stage, .. }
            | StageError::Panicked { stage, .. } => *stage,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error(
        "Protocol violation from worker {worker}: '{stage}' request carried a report of length {report_len}"
    )]
    ProtocolViolation {
        worker: usize,
        stage: Stage,
        report_len: usize,
    },

    #[error("Coordinator is no longer accepting requests")]
    Closed,

    #[error("Coordinator dropped the request from worker {worker} without replying")]
    NoReply { worker: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Worker {worker} could not prepare workspace '{path}': {source}", path = path.display())]
    Workspace {
        worker: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Coordinator exchange failed: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Worker {worker} terminated abnormally: {message}")]
    WorkerAborted { worker: usize, message: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
