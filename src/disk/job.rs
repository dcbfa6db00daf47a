use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::sync::oneshot;

use super::error::{DiskError, SubJobFailure};
use super::queue::JobKey;
use crate::mapper::SpanningEntry;

/// Identifier of a disk job, unique within one torrent's scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn new(id: u64) -> Self {
        JobId(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    PieceWrite,
    PieceRead,
    GetMetadata,
    Truncate,
    ZeroFill,
    Write,
    Read,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobType::PieceWrite => "piece-write",
            JobType::PieceRead => "piece-read",
            JobType::GetMetadata => "get-metadata",
            JobType::Truncate => "truncate",
            JobType::ZeroFill => "zero-fill",
            JobType::Write => "write",
            JobType::Read => "read",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a file-level job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    /// Opening or creating the file.
    GetEntry,
    Running,
    Done,
    Error,
}

impl JobState {
    pub fn can_transition(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, GetEntry) | (Idle, Error) | (GetEntry, Running) | (GetEntry, Error) | (Running, Done) | (Running, Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

pub(crate) enum Job {
    Leaf(LeafJob),
    Composite(CompositeJob),
}

impl Job {
    pub(crate) fn id(&self) -> JobId {
        match self {
            Job::Leaf(leaf) => leaf.id,
            Job::Composite(composite) => composite.id,
        }
    }
}

/// One storage call against one file.
#[derive(Debug, Clone)]
pub(crate) enum LeafOp {
    GetMetadata { path: PathBuf },
    Truncate { path: PathBuf, size: u64 },
    ZeroFill { path: PathBuf, from: u64, to: u64 },
    Write { path: PathBuf, offset: u64, data: Bytes },
    /// `slot` is the position of this span in the assembled buffer.
    Read { path: PathBuf, offset: u64, len: usize, slot: usize },
}

impl LeafOp {
    pub(crate) fn job_type(&self) -> JobType {
        match self {
            LeafOp::GetMetadata { .. } => JobType::GetMetadata,
            LeafOp::Truncate { .. } => JobType::Truncate,
            LeafOp::ZeroFill { .. } => JobType::ZeroFill,
            LeafOp::Write { .. } => JobType::Write,
            LeafOp::Read { .. } => JobType::Read,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        match self {
            LeafOp::GetMetadata { path }
            | LeafOp::Truncate { path, .. }
            | LeafOp::ZeroFill { path, .. }
            | LeafOp::Write { path, .. }
            | LeafOp::Read { path, .. } => path,
        }
    }

    /// Whether the file must be opened writable (and created if missing).
    pub(crate) fn needs_write(&self) -> bool {
        !matches!(self, LeafOp::Read { .. })
    }
}

pub(crate) struct LeafJob {
    pub(crate) id: JobId,
    pub(crate) parent: JobKey,
    pub(crate) file: usize,
    pub(crate) state: JobState,
    pub(crate) op: LeafOp,
}

impl LeafJob {
    pub(crate) fn new(id: JobId, parent: JobKey, file: usize, op: LeafOp) -> Self {
        Self {
            id,
            parent,
            file,
            state: JobState::Idle,
            op,
        }
    }

    pub(crate) fn transition(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal job transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

/// What a finished leaf hands back to its parent.
#[derive(Debug)]
pub(crate) enum LeafOutcome {
    Done,
    Size(u64),
    Data(Bytes),
}

pub(crate) enum CompositeKind {
    Write { data: Bytes },
    Read { offset: u64, len: u64 },
}

/// Where a composite job is in its decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    New,
    Metadata,
    Writing,
    Reading,
}

pub(crate) enum Completion {
    Write(oneshot::Sender<Result<(), DiskError>>),
    Read(oneshot::Sender<Result<Bytes, DiskError>>),
}

impl Completion {
    // A dropped receiver means the caller went away; the result is discarded.
    fn fail(self, error: DiskError) {
        match self {
            Completion::Write(tx) => {
                let _ = tx.send(Err(error));
            }
            Completion::Read(tx) => {
                let _ = tx.send(Err(error));
            }
        }
    }
}

/// A piece operation that fans out into per-file leaf jobs.
pub(crate) struct CompositeJob {
    pub(crate) id: JobId,
    pub(crate) piece: u32,
    pub(crate) kind: CompositeKind,
    pub(crate) phase: Phase,
    pub(crate) spans: Vec<SpanningEntry>,
    /// Known on-disk sizes of the touched files.
    pub(crate) sizes: BTreeMap<usize, u64>,
    pub(crate) pending: usize,
    pub(crate) failures: Vec<SubJobFailure>,
    pub(crate) parts: Vec<Option<Bytes>>,
    completion: Option<Completion>,
}

impl CompositeJob {
    pub(crate) fn write(
        id: JobId,
        piece: u32,
        data: Bytes,
        reply: oneshot::Sender<Result<(), DiskError>>,
    ) -> Self {
        Self::new(id, piece, CompositeKind::Write { data }, Completion::Write(reply))
    }

    pub(crate) fn read(
        id: JobId,
        piece: u32,
        offset: u64,
        len: u64,
        reply: oneshot::Sender<Result<Bytes, DiskError>>,
    ) -> Self {
        Self::new(id, piece, CompositeKind::Read { offset, len }, Completion::Read(reply))
    }

    fn new(id: JobId, piece: u32, kind: CompositeKind, completion: Completion) -> Self {
        Self {
            id,
            piece,
            kind,
            phase: Phase::New,
            spans: Vec::new(),
            sizes: BTreeMap::new(),
            pending: 0,
            failures: Vec::new(),
            parts: Vec::new(),
            completion: Some(completion),
        }
    }

    pub(crate) fn job_type(&self) -> JobType {
        match self.kind {
            CompositeKind::Write { .. } => JobType::PieceWrite,
            CompositeKind::Read { .. } => JobType::PieceRead,
        }
    }

    pub(crate) fn is_write(&self) -> bool {
        matches!(self.kind, CompositeKind::Write { .. })
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completion.is_none()
    }

    /// Collected sub-job failures as one error, if there were any.
    pub(crate) fn take_failure(&mut self) -> Option<DiskError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(DiskError::PieceFailed {
            piece: self.piece,
            failures: std::mem::take(&mut self.failures),
        })
    }

    pub(crate) fn fail(&mut self, error: DiskError) {
        if let Some(completion) = self.completion.take() {
            completion.fail(error);
        }
    }

    pub(crate) fn complete_write(&mut self) {
        match self.completion.take() {
            Some(Completion::Write(tx)) => {
                let _ = tx.send(Ok(()));
            }
            Some(other) => self.completion = Some(other),
            None => {}
        }
    }

    pub(crate) fn complete_read(&mut self, data: Bytes) {
        match self.completion.take() {
            Some(Completion::Read(tx)) => {
                let _ = tx.send(Ok(data));
            }
            Some(other) => self.completion = Some(other),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_transitions() {
        assert!(JobState::Idle.can_transition(JobState::GetEntry));
        assert!(JobState::GetEntry.can_transition(JobState::Running));
        assert!(JobState::Running.can_transition(JobState::Done));
        assert!(JobState::GetEntry.can_transition(JobState::Error));
        assert!(!JobState::Idle.can_transition(JobState::Running));
        assert!(!JobState::Done.can_transition(JobState::Running));
        assert!(!JobState::Error.can_transition(JobState::Done));
        assert!(JobState::Done.is_terminal());
    }

    #[test]
    fn test_completion_fires_once() {
        let (tx, mut rx) = oneshot::channel();
        let mut job = CompositeJob::write(JobId::new(1), 0, Bytes::new(), tx);
        job.fail(DiskError::Cancelled);
        job.complete_write();
        assert!(job.is_completed());
        assert!(matches!(rx.try_recv(), Ok(Err(DiskError::Cancelled))));
    }

    #[test]
    fn test_take_failure_aggregates() {
        let (tx, _rx) = oneshot::channel();
        let mut job = CompositeJob::read(JobId::new(7), 3, 0, 10, tx);
        assert!(job.take_failure().is_none());
        job.failures.push(SubJobFailure {
            job: JobId::new(8),
            job_type: JobType::Read,
            file: 1,
            error: DiskError::Timeout(std::time::Duration::from_secs(1)),
        });
        match job.take_failure() {
            Some(DiskError::PieceFailed { piece, failures }) => {
                assert_eq!(piece, 3);
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
