use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::job::{JobId, JobType};
use crate::metainfo::MetainfoError;
use crate::storage::StorageError;

/// One failed sub-job of a piece operation.
#[derive(Debug, Clone)]
pub struct SubJobFailure {
    pub job: JobId,
    pub job_type: JobType,
    pub file: usize,
    pub error: DiskError,
}

impl fmt::Display for SubJobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on file {}: {}",
            self.job, self.job_type, self.file, self.error
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum DiskError {
    /// The file could not be opened or created.
    #[error("could not resolve {path}: {source}")]
    EntryResolutionFailed { path: String, source: StorageError },

    #[error("write to {path} failed: {source}")]
    WriteFailed { path: String, source: StorageError },

    #[error("read from {path} failed: {source}")]
    ReadFailed { path: String, source: StorageError },

    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    #[error("job stalled at the head of the queue")]
    Stalled,

    /// Writes are halted until the storage is replaced.
    #[error("disk halted: {0}")]
    Fatal(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("piece {0} failed hash check")]
    HashMismatch(u32),

    #[error("piece {piece}: {}", join_failures(.failures))]
    PieceFailed {
        piece: u32,
        failures: Vec<SubJobFailure>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("disk worker has shut down")]
    WorkerGone,
}

fn join_failures(failures: &[SubJobFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DiskError {
    /// True for errors that need the user to pick new storage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DiskError::Fatal(_))
    }

    /// The failures of a piece operation, or this error alone.
    pub fn failures(&self) -> Vec<&DiskError> {
        match self {
            DiskError::PieceFailed { failures, .. } => failures.iter().map(|f| &f.error).collect(),
            other => vec![other],
        }
    }

    /// Native error name of the underlying storage failure, if any.
    pub fn storage_kind(&self) -> Option<String> {
        match self {
            DiskError::EntryResolutionFailed { source, .. }
            | DiskError::WriteFailed { source, .. }
            | DiskError::ReadFailed { source, .. } => Some(source.kind_name()),
            _ => None,
        }
    }
}

impl From<MetainfoError> for DiskError {
    fn from(e: MetainfoError) -> Self {
        DiskError::InvalidRequest(e.to_string())
    }
}
