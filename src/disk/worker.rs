use std::future::pending;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use super::error::{DiskError, SubJobFailure};
use super::handle::{DiskCaches, DiskEvent, DiskStatus};
use super::job::{CompositeJob, CompositeKind, Job, JobId, JobState, LeafJob, LeafOp, LeafOutcome, Phase};
use super::queue::{JobKey, JobQueue};
use crate::config::{DiskConfig, PadStrategy};
use crate::mapper::{piece_spans, spanning_files_for_piece, SpanningEntry};
use crate::metainfo::{FilePriority, Torrent};
use crate::storage::{Storage, StorageId};

pub(crate) enum Command {
    WritePiece {
        piece: u32,
        data: Bytes,
        reply: oneshot::Sender<Result<(), DiskError>>,
    },
    ReadPiece {
        piece: u32,
        offset: u64,
        len: u64,
        reply: oneshot::Sender<Result<Bytes, DiskError>>,
    },
    CancelAll {
        reply: oneshot::Sender<usize>,
    },
    ReplaceStorage {
        storage: Arc<dyn Storage>,
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<DiskStatus>,
    },
    Shutdown,
}

type LeafFuture = BoxFuture<'static, Result<LeafOutcome, DiskError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Entry,
    Op,
}

/// The one storage call currently in flight.
struct Active {
    key: JobKey,
    id: JobId,
    stage: Stage,
    deadline: Instant,
    storage_id: StorageId,
    fut: LeafFuture,
}

enum Mode {
    Running,
    Halted { reason: String },
}

/// Counts stall checks that saw the same job at the head of the queue.
#[derive(Default)]
struct StallDetector {
    last_head: Option<JobId>,
    unchanged: u32,
}

impl StallDetector {
    fn observe(&mut self, head: Option<JobId>, threshold: u32) -> bool {
        match head {
            Some(id) if self.last_head == Some(id) => {
                self.unchanged += 1;
                if self.unchanged >= threshold {
                    self.reset();
                    return true;
                }
                false
            }
            _ => {
                self.last_head = head;
                self.unchanged = 0;
                false
            }
        }
    }

    fn reset(&mut self) {
        self.last_head = None;
        self.unchanged = 0;
    }
}

/// Drains one torrent's disk jobs, one storage call at a time.
pub(crate) struct Worker {
    torrent: Arc<Torrent>,
    storage: Arc<dyn Storage>,
    config: DiskConfig,
    caches: DiskCaches,
    events: broadcast::Sender<DiskEvent>,
    queue: JobQueue,
    next_id: u64,
    stall: StallDetector,
    stall_count: u32,
    /// Timeouts since the last successful storage call.
    timeouts_in_row: u32,
    mode: Mode,
}

impl Worker {
    pub(crate) fn new(
        torrent: Arc<Torrent>,
        storage: Arc<dyn Storage>,
        caches: DiskCaches,
        config: DiskConfig,
        events: broadcast::Sender<DiskEvent>,
    ) -> Self {
        Self {
            torrent,
            storage,
            config,
            caches,
            events,
            queue: JobQueue::new(),
            next_id: 1,
            stall: StallDetector::default(),
            stall_count: 0,
            timeouts_in_row: 0,
            mode: Mode::Running,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let period = self.config.stall_check_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut active: Option<Active> = None;
        let mut open = true;

        debug!(torrent = %self.torrent.info_hash(), "disk worker started");

        loop {
            if active.is_none() {
                active = self.start_next();
            }
            if !open && active.is_none() {
                break;
            }

            tokio::select! {
                cmd = commands.recv(), if open => match cmd {
                    Some(Command::Shutdown) | None => {
                        self.cancel_all();
                        open = false;
                    }
                    Some(cmd) => self.handle_command(cmd, active.is_some()),
                },
                result = poll_active(&mut active, self.config.job_timeout) => {
                    if let Some(done) = active.take() {
                        active = self.finish_stage(done, result);
                    }
                }
                _ = ticker.tick() => self.check_stall(&mut active),
            }
        }

        debug!(torrent = %self.torrent.info_hash(), "disk worker stopped");
    }

    fn handle_command(&mut self, cmd: Command, busy: bool) {
        match cmd {
            Command::WritePiece { piece, data, reply } => {
                let id = self.next_job_id();
                debug!(job = %id, piece, len = data.len(), "queued piece write");
                self.queue
                    .push_back(Job::Composite(CompositeJob::write(id, piece, data, reply)));
            }
            Command::ReadPiece {
                piece,
                offset,
                len,
                reply,
            } => {
                let id = self.next_job_id();
                trace!(job = %id, piece, offset, len, "queued piece read");
                self.queue
                    .push_back(Job::Composite(CompositeJob::read(id, piece, offset, len, reply)));
            }
            Command::CancelAll { reply } => {
                let _ = reply.send(self.cancel_all());
            }
            Command::ReplaceStorage { storage, reply } => {
                self.replace_storage(storage);
                let _ = reply.send(());
            }
            Command::Status { reply } => {
                let _ = reply.send(DiskStatus {
                    queued: self.queue.len(),
                    active: busy,
                    halted: matches!(self.mode, Mode::Halted { .. }),
                    stall_count: self.stall_count,
                });
            }
            Command::Shutdown => {}
        }
    }

    fn next_job_id(&mut self) -> JobId {
        let id = JobId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Steps composites at the head until a leaf is ready to start.
    fn start_next(&mut self) -> Option<Active> {
        loop {
            let key = self.queue.head()?;
            if self.queue.is_leaf(key) {
                return self.start_leaf(key);
            }
            self.step_composite(key);
        }
    }

    fn start_leaf(&mut self, key: JobKey) -> Option<Active> {
        let storage = Arc::clone(&self.storage);
        let Some(Job::Leaf(leaf)) = self.queue.get_mut(key) else {
            return None;
        };
        leaf.transition(JobState::GetEntry);
        trace!(job = %leaf.id, job_type = %leaf.op.job_type(), path = %leaf.op.path().display(), "resolving entry");

        Some(Active {
            key,
            id: leaf.id,
            stage: Stage::Entry,
            deadline: Instant::now() + self.config.job_timeout,
            storage_id: storage.id(),
            fut: resolve_entry(storage, leaf.op.clone()),
        })
    }

    fn finish_stage(&mut self, done: Active, result: Result<LeafOutcome, DiskError>) -> Option<Active> {
        if done.stage == Stage::Entry && result.is_ok() {
            let storage = Arc::clone(&self.storage);
            let chunk = self.config.zero_fill_chunk;
            let Some(Job::Leaf(leaf)) = self.queue.get_mut(done.key) else {
                trace!(job = %done.id, "discarding result of cancelled job");
                return None;
            };
            leaf.transition(JobState::Running);
            return Some(Active {
                stage: Stage::Op,
                fut: run_op(storage, leaf.op.clone(), chunk),
                ..done
            });
        }
        self.complete_leaf(done.key, done.storage_id, result);
        None
    }

    fn complete_leaf(&mut self, key: JobKey, storage_id: StorageId, result: Result<LeafOutcome, DiskError>) {
        if !self.queue.is_leaf(key) {
            trace!("discarding result of cancelled job");
            return;
        }
        let Some(Job::Leaf(mut leaf)) = self.queue.remove(key) else {
            return;
        };
        leaf.transition(if result.is_ok() {
            JobState::Done
        } else {
            JobState::Error
        });

        if storage_id == self.storage.id() {
            self.update_metadata_cache(storage_id, &leaf.op, &result);
        }

        match &result {
            Ok(_) => self.timeouts_in_row = 0,
            Err(DiskError::Timeout(_)) => self.timeouts_in_row += 1,
            Err(_) => {}
        }

        let job_type = leaf.op.job_type();
        match &result {
            Ok(_) => trace!(job = %leaf.id, %job_type, "sub-job done"),
            Err(error) => {
                warn!(job = %leaf.id, %job_type, file = leaf.file, %error, "sub-job failed");
                let _ = self.events.send(DiskEvent::JobFailed {
                    job: leaf.id,
                    job_type,
                    error: error.clone(),
                });
            }
        }

        let parent = leaf.parent;
        if let Some(composite) = self.queue.composite_mut(parent) {
            match result {
                Ok(LeafOutcome::Size(size)) => {
                    composite.sizes.insert(leaf.file, size);
                }
                Ok(LeafOutcome::Data(data)) => {
                    if let LeafOp::Read { slot, .. } = leaf.op {
                        if let Some(part) = composite.parts.get_mut(slot) {
                            *part = Some(data);
                        }
                    }
                }
                Ok(LeafOutcome::Done) => {}
                Err(error) => composite.failures.push(SubJobFailure {
                    job: leaf.id,
                    job_type,
                    file: leaf.file,
                    error,
                }),
            }
            composite.pending = composite.pending.saturating_sub(1);
            if composite.pending == 0 {
                self.queue.requeue_front(parent);
            }
        }

        // a device that never answers shows up as timeouts, not stalls
        if self.timeouts_in_row >= self.config.fatal_stall_count && matches!(self.mode, Mode::Running) {
            self.halt(format!("{} disk jobs timed out in a row", self.timeouts_in_row));
        }
    }

    fn update_metadata_cache(&self, storage: StorageId, op: &LeafOp, result: &Result<LeafOutcome, DiskError>) {
        let cache = &self.caches.metadata;
        match (op, result) {
            (
                LeafOp::GetMetadata { path } | LeafOp::Truncate { path, .. } | LeafOp::ZeroFill { path, .. },
                Ok(LeafOutcome::Size(size)),
            ) => cache.set_size(storage, path, *size),
            (LeafOp::Write { path, offset, data }, Ok(_)) => {
                cache.extend_to(storage, path, offset + data.len() as u64)
            }
            (op, Err(_)) if op.needs_write() => cache.invalidate(storage, op.path()),
            _ => {}
        }
    }

    fn step_composite(&mut self, key: JobKey) {
        let Some(Job::Composite(job)) = self.queue.remove(key) else {
            return;
        };
        match job.phase {
            Phase::New if job.is_write() => self.expand_write(job),
            Phase::New => self.expand_read(job),
            Phase::Metadata => self.schedule_writes(job),
            Phase::Writing | Phase::Reading => self.aggregate(job),
        }
    }

    fn expand_write(&mut self, mut job: CompositeJob) {
        if let Mode::Halted { reason } = &self.mode {
            let error = DiskError::Fatal(reason.clone());
            return self.fail_composite(job, error);
        }
        let CompositeKind::Write { data } = &job.kind else {
            return;
        };
        let expected = match self.torrent.piece_size(job.piece) {
            Ok(size) => size,
            Err(e) => return self.fail_composite(job, e.into()),
        };
        if data.len() as u64 != expected {
            let error = DiskError::InvalidRequest(format!(
                "piece {} is {} bytes, got {}",
                job.piece,
                expected,
                data.len()
            ));
            return self.fail_composite(job, error);
        }

        let spans = match piece_spans(&self.torrent, job.piece) {
            Ok(spans) => spans,
            Err(e) => return self.fail_composite(job, e.into()),
        };
        job.spans = spans
            .into_iter()
            .filter(|span| self.torrent.file_priority(span.file) != FilePriority::Skip)
            .collect();
        job.phase = Phase::Metadata;

        let paths = match self.span_paths(&job.spans) {
            Ok(paths) => paths,
            Err(e) => return self.fail_composite(job, e),
        };
        let storage_id = self.storage.id();
        let mut children = Vec::new();
        for (file, path) in paths {
            match self.caches.metadata.size(storage_id, &path) {
                Some(size) => {
                    job.sizes.insert(file, size);
                }
                None => children.push((file, LeafOp::GetMetadata { path })),
            }
        }

        if children.is_empty() {
            self.schedule_writes(job);
        } else {
            self.spawn_children(job, children);
        }
    }

    fn schedule_writes(&mut self, mut job: CompositeJob) {
        if let Some(error) = job.take_failure() {
            return self.fail_composite(job, error);
        }
        if let Mode::Halted { reason } = &self.mode {
            let error = DiskError::Fatal(reason.clone());
            return self.fail_composite(job, error);
        }
        let CompositeKind::Write { data } = &job.kind else {
            return;
        };
        let data = data.clone();
        let paths = match self.span_paths(&job.spans) {
            Ok(paths) => paths,
            Err(e) => return self.fail_composite(job, e),
        };

        let mut pads = Vec::new();
        let mut writes = Vec::new();
        for (span, (_, path)) in job.spans.iter().zip(paths) {
            match job.sizes.get(&span.file) {
                Some(&size) if size < span.file_offset => {
                    let pad = match self.config.pad_strategy {
                        PadStrategy::Truncate => LeafOp::Truncate {
                            path: path.clone(),
                            size: span.file_offset,
                        },
                        PadStrategy::ZeroFill => LeafOp::ZeroFill {
                            path: path.clone(),
                            from: size,
                            to: span.file_offset,
                        },
                    };
                    pads.push((span.file, pad));
                }
                _ => {}
            }
            let start = span.piece_offset as usize;
            let end = start + span.length as usize;
            writes.push((
                span.file,
                LeafOp::Write {
                    path,
                    offset: span.file_offset,
                    data: data.slice(start..end),
                },
            ));
        }

        job.phase = Phase::Writing;
        pads.extend(writes);
        if pads.is_empty() {
            self.aggregate(job);
        } else {
            self.spawn_children(job, pads);
        }
    }

    fn expand_read(&mut self, mut job: CompositeJob) {
        let CompositeKind::Read { offset, len } = job.kind else {
            return;
        };
        let info_hash = *self.torrent.info_hash();
        if let Some(cached) = self.caches.pieces.get(&info_hash, job.piece) {
            let end = offset.saturating_add(len);
            if end <= cached.len() as u64 {
                trace!(job = %job.id, piece = job.piece, "piece cache hit");
                job.complete_read(cached.slice(offset as usize..end as usize));
                return;
            }
        }

        let spans = match spanning_files_for_piece(&self.torrent, job.piece, offset, len) {
            Ok(spans) => spans,
            Err(e) => return self.fail_composite(job, e.into()),
        };
        let paths = match self.span_paths(&spans) {
            Ok(paths) => paths,
            Err(e) => return self.fail_composite(job, e),
        };
        let mut children = Vec::with_capacity(spans.len());
        for (slot, (span, (_, path))) in spans.iter().zip(paths).enumerate() {
            children.push((
                span.file,
                LeafOp::Read {
                    path,
                    offset: span.file_offset,
                    len: span.length as usize,
                    slot,
                },
            ));
        }

        job.spans = spans;
        job.parts = vec![None; children.len()];
        job.phase = Phase::Reading;
        if children.is_empty() {
            self.aggregate(job);
        } else {
            self.spawn_children(job, children);
        }
    }

    fn aggregate(&mut self, mut job: CompositeJob) {
        if let Some(error) = job.take_failure() {
            return self.fail_composite(job, error);
        }
        let info_hash = *self.torrent.info_hash();
        match &job.kind {
            CompositeKind::Write { data } => {
                if !job.spans.is_empty() {
                    self.caches.pieces.insert(&info_hash, job.piece, data.clone());
                }
                debug!(job = %job.id, piece = job.piece, "piece written");
                let _ = self.events.send(DiskEvent::PieceWritten { piece: job.piece });
                job.complete_write();
            }
            CompositeKind::Read { offset, len } => {
                let (offset, len) = (*offset, *len);
                let parts: Vec<Bytes> = job.parts.drain(..).flatten().collect();
                let data = match parts.len() {
                    0 => Bytes::new(),
                    1 => parts.into_iter().next().unwrap_or_default(),
                    _ => {
                        let mut buf = BytesMut::with_capacity(len as usize);
                        for part in &parts {
                            buf.extend_from_slice(part);
                        }
                        buf.freeze()
                    }
                };
                let whole = offset == 0 && self.torrent.piece_size(job.piece).ok() == Some(len);
                if whole && !data.is_empty() {
                    self.caches.pieces.insert(&info_hash, job.piece, data.clone());
                }
                debug!(job = %job.id, piece = job.piece, len = data.len(), "piece read");
                job.complete_read(data);
            }
        }
    }

    fn spawn_children(&mut self, mut job: CompositeJob, children: Vec<(usize, LeafOp)>) {
        job.pending = children.len();
        let id = job.id;
        let parent = self.queue.insert_detached(Job::Composite(job));
        let mut leaves = Vec::with_capacity(children.len());
        for (file, op) in children {
            let leaf_id = self.next_job_id();
            leaves.push(Job::Leaf(LeafJob::new(leaf_id, parent, file, op)));
        }
        trace!(job = %id, children = leaves.len(), "expanded composite job");
        self.queue.push_front_all(leaves);
    }

    fn fail_composite(&mut self, mut job: CompositeJob, error: DiskError) {
        if !matches!(error, DiskError::Cancelled) {
            warn!(job = %job.id, piece = job.piece, %error, "piece job failed");
            let _ = self.events.send(DiskEvent::JobFailed {
                job: job.id,
                job_type: job.job_type(),
                error: error.clone(),
            });
        }
        job.fail(error);
    }

    /// Removes a composite and its children, failing it.
    fn abort_composite(&mut self, key: JobKey, error: DiskError) {
        let children = self
            .queue
            .keys_where(|job| matches!(job, Job::Leaf(leaf) if leaf.parent == key));
        for child in children {
            self.queue.remove(child);
        }
        if let Some(Job::Composite(job)) = self.queue.remove(key) {
            self.fail_composite(job, error);
        }
    }

    fn span_paths(&self, spans: &[SpanningEntry]) -> Result<Vec<(usize, PathBuf)>, DiskError> {
        spans
            .iter()
            .map(|span| {
                let file = self.torrent.file(span.file)?;
                Ok::<_, DiskError>((span.file, file.relative_path()))
            })
            .collect()
    }

    /// Fails the head job if it has not moved for `stall_intervals` checks.
    ///
    /// A storage call in flight for the stalled job is abandoned, not
    /// awaited. Its future is dropped, so the next job can start while a
    /// blocking write handed off by that call is still running.
    fn check_stall(&mut self, active: &mut Option<Active>) {
        let head = self.queue.head_id();
        if !self.stall.observe(head, self.config.stall_intervals) {
            return;
        }
        let (Some(key), Some(id)) = (self.queue.head(), head) else {
            return;
        };

        self.stall_count += 1;
        warn!(job = %id, stalls = self.stall_count, "disk job stalled, failing it");
        if active.as_ref().is_some_and(|a| a.key == key) {
            *active = None;
        }
        let _ = self.events.send(DiskEvent::Stalled {
            job: id,
            count: self.stall_count,
        });
        if self.queue.is_leaf(key) {
            let storage_id = self.storage.id();
            self.complete_leaf(key, storage_id, Err(DiskError::Stalled));
        } else {
            self.abort_composite(key, DiskError::Stalled);
        }

        if self.stall_count >= self.config.fatal_stall_count && matches!(self.mode, Mode::Running) {
            self.halt(format!("{} disk jobs stalled", self.stall_count));
        }
    }

    fn halt(&mut self, reason: String) {
        error!(torrent = %self.torrent.info_hash(), %reason, "storage unusable, halting writes");
        let _ = self.events.send(DiskEvent::Fatal {
            reason: reason.clone(),
        });

        let doomed = self.queue.keys_where(|job| match job {
            Job::Composite(c) => c.is_write() && (c.phase == Phase::New || c.pending > 0),
            Job::Leaf(_) => false,
        });
        for key in doomed {
            self.abort_composite(key, DiskError::Fatal(reason.clone()));
        }
        self.mode = Mode::Halted { reason };
    }

    fn replace_storage(&mut self, storage: Arc<dyn Storage>) {
        let old = self.storage.id();
        self.caches.metadata.clear_storage(old);
        debug!(
            torrent = %self.torrent.info_hash(),
            old = old.get(),
            new = storage.id().get(),
            "storage replaced"
        );
        self.storage = storage;
        self.stall_count = 0;
        self.timeouts_in_row = 0;
        self.stall.reset();
        self.mode = Mode::Running;
    }

    /// Fails every queued job. A call already in flight runs to completion
    /// and its result is dropped.
    fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for job in self.queue.drain() {
            if let Job::Composite(mut composite) = job {
                if !composite.is_completed() {
                    composite.fail(DiskError::Cancelled);
                    cancelled += 1;
                }
            }
        }
        self.stall.reset();
        debug!(torrent = %self.torrent.info_hash(), cancelled, "cancelled disk jobs");
        cancelled
    }
}

async fn poll_active(active: &mut Option<Active>, timeout: Duration) -> Result<LeafOutcome, DiskError> {
    match active {
        Some(a) => match timeout_at(a.deadline, a.fut.as_mut()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(job = %a.id, ?timeout, "disk job timed out");
                Err(DiskError::Timeout(timeout))
            }
        },
        None => pending().await,
    }
}

fn resolve_entry(storage: Arc<dyn Storage>, op: LeafOp) -> LeafFuture {
    async move {
        let path = op.path();
        let opened = if op.needs_write() {
            storage.open_for_write(path).await
        } else {
            storage.open_for_read(path).await
        };
        opened
            .map(|_| LeafOutcome::Done)
            .map_err(|source| DiskError::EntryResolutionFailed {
                path: path.display().to_string(),
                source,
            })
    }
    .boxed()
}

fn run_op(storage: Arc<dyn Storage>, op: LeafOp, zero_fill_chunk: usize) -> LeafFuture {
    async move {
        let display = op.path().display().to_string();
        match op {
            LeafOp::GetMetadata { path } => storage
                .metadata(&path)
                .await
                .map(|meta| LeafOutcome::Size(meta.size))
                .map_err(|source| DiskError::ReadFailed { path: display, source }),
            // Pads only ever grow a file. The size they were planned from
            // may be stale, so the live size is read again first.
            LeafOp::Truncate { path, size } => {
                let current = live_size(storage.as_ref(), &path, &display).await?;
                if current >= size {
                    return Ok(LeafOutcome::Size(current));
                }
                storage
                    .truncate(&path, size)
                    .await
                    .map_err(|source| DiskError::WriteFailed { path: display, source })?;
                Ok(LeafOutcome::Size(size))
            }
            LeafOp::ZeroFill { path, from, to } => {
                let current = live_size(storage.as_ref(), &path, &display).await?;
                let chunk = zero_fill_chunk.max(1) as u64;
                let mut pos = from.max(current);
                let zeros = vec![0u8; chunk.min(to.saturating_sub(pos)) as usize];
                while pos < to {
                    let n = chunk.min(to - pos) as usize;
                    storage
                        .write_at(&path, pos, &zeros[..n])
                        .await
                        .map_err(|source| DiskError::WriteFailed {
                            path: display.clone(),
                            source,
                        })?;
                    pos += n as u64;
                }
                Ok(LeafOutcome::Size(current.max(to)))
            }
            LeafOp::Write { path, offset, data } => storage
                .write_at(&path, offset, &data)
                .await
                .map(|_| LeafOutcome::Done)
                .map_err(|source| DiskError::WriteFailed { path: display, source }),
            LeafOp::Read { path, offset, len, .. } => storage
                .read_at(&path, offset, len)
                .await
                .map(LeafOutcome::Data)
                .map_err(|source| DiskError::ReadFailed { path: display, source }),
        }
    }
    .boxed()
}

async fn live_size(storage: &dyn Storage, path: &Path, display: &str) -> Result<u64, DiskError> {
    storage
        .metadata(path)
        .await
        .map(|meta| meta.size)
        .map_err(|source| DiskError::ReadFailed {
            path: display.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stall_detector_needs_consecutive_samples() {
        let mut detector = StallDetector::default();
        let a = Some(JobId::new(1));
        let b = Some(JobId::new(2));
        assert!(!detector.observe(a, 2));
        assert!(!detector.observe(a, 2));
        assert!(!detector.observe(b, 2));
        assert!(!detector.observe(b, 2));
        assert!(detector.observe(b, 2));
        // Counting restarts after a stall is reported.
        assert!(!detector.observe(b, 2));
    }

    #[test]
    fn test_stall_detector_ignores_empty_queue() {
        let mut detector = StallDetector::default();
        for _ in 0..5 {
            assert!(!detector.observe(None, 2));
        }
    }
}
