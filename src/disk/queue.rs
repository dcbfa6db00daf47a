use std::collections::VecDeque;

use super::job::{CompositeJob, Job, JobId};

/// Stable handle to a job slot. The generation makes handles to removed
/// jobs stale instead of aliasing whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct JobKey {
    index: usize,
    generation: u64,
}

struct Slot {
    generation: u64,
    job: Option<Job>,
}

#[derive(Default)]
struct JobArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    len: usize,
}

impl JobArena {
    fn insert(&mut self, job: Job) -> JobKey {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.job = Some(job);
            return JobKey {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            job: Some(job),
        });
        JobKey {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn get(&self, key: JobKey) -> Option<&Job> {
        self.slots
            .get(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.job.as_ref())
    }

    fn get_mut(&mut self, key: JobKey) -> Option<&mut Job> {
        self.slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.job.as_mut())
    }

    fn remove(&mut self, key: JobKey) -> Option<Job> {
        let slot = self
            .slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)?;
        let job = slot.job.take()?;
        self.free.push(key.index);
        self.len -= 1;
        Some(job)
    }

    fn keys(&self) -> impl Iterator<Item = JobKey> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.job.as_ref().map(|_| JobKey {
                index,
                generation: slot.generation,
            })
        })
    }
}

/// FIFO of runnable jobs over an arena that also holds composites
/// waiting on their children.
#[derive(Default)]
pub(crate) struct JobQueue {
    arena: JobArena,
    order: VecDeque<JobKey>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_back(&mut self, job: Job) -> JobKey {
        let key = self.arena.insert(job);
        self.order.push_back(key);
        key
    }

    /// Queues `jobs` ahead of everything else, keeping their order.
    pub(crate) fn push_front_all(&mut self, jobs: Vec<Job>) -> Vec<JobKey> {
        let keys: Vec<JobKey> = jobs.into_iter().map(|job| self.arena.insert(job)).collect();
        for key in keys.iter().rev() {
            self.order.push_front(*key);
        }
        keys
    }

    /// Stores a job without making it runnable.
    pub(crate) fn insert_detached(&mut self, job: Job) -> JobKey {
        self.arena.insert(job)
    }

    /// Makes a detached job the next to run.
    pub(crate) fn requeue_front(&mut self, key: JobKey) {
        if self.arena.get(key).is_some() && !self.order.contains(&key) {
            self.order.push_front(key);
        }
    }

    pub(crate) fn head(&self) -> Option<JobKey> {
        self.order.front().copied()
    }

    pub(crate) fn head_id(&self) -> Option<JobId> {
        self.head().and_then(|key| self.arena.get(key)).map(Job::id)
    }

    pub(crate) fn get(&self, key: JobKey) -> Option<&Job> {
        self.arena.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: JobKey) -> Option<&mut Job> {
        self.arena.get_mut(key)
    }

    pub(crate) fn composite_mut(&mut self, key: JobKey) -> Option<&mut CompositeJob> {
        match self.arena.get_mut(key) {
            Some(Job::Composite(job)) => Some(job),
            _ => None,
        }
    }

    pub(crate) fn is_leaf(&self, key: JobKey) -> bool {
        matches!(self.arena.get(key), Some(Job::Leaf(_)))
    }

    pub(crate) fn remove(&mut self, key: JobKey) -> Option<Job> {
        let job = self.arena.remove(key)?;
        self.order.retain(|k| *k != key);
        Some(job)
    }

    /// Keys of all stored jobs, runnable or detached, matching `pred`.
    pub(crate) fn keys_where(&self, pred: impl Fn(&Job) -> bool) -> Vec<JobKey> {
        self.arena
            .keys()
            .filter(|key| self.arena.get(*key).is_some_and(&pred))
            .collect()
    }

    /// Removes and returns every job.
    pub(crate) fn drain(&mut self) -> Vec<Job> {
        let keys: Vec<JobKey> = self.arena.keys().collect();
        self.order.clear();
        keys.into_iter().filter_map(|key| self.arena.remove(key)).collect()
    }

    /// Jobs stored, including composites waiting on children.
    pub(crate) fn len(&self) -> usize {
        self.arena.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.arena.len == 0
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio::sync::oneshot;

    use super::*;
    use crate::disk::job::{LeafJob, LeafOp};

    fn composite(id: u64) -> Job {
        let (tx, _rx) = oneshot::channel();
        Job::Composite(CompositeJob::read(JobId::new(id), 0, 0, 1, tx))
    }

    fn leaf(id: u64, parent: JobKey) -> Job {
        Job::Leaf(LeafJob::new(
            JobId::new(id),
            parent,
            0,
            LeafOp::GetMetadata {
                path: PathBuf::from("a"),
            },
        ))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = JobQueue::new();
        queue.push_back(composite(1));
        queue.push_back(composite(2));
        assert_eq!(queue.head_id(), Some(JobId::new(1)));
        let head = queue.head().unwrap();
        queue.remove(head);
        assert_eq!(queue.head_id(), Some(JobId::new(2)));
    }

    #[test]
    fn test_children_run_before_queued_jobs() {
        let mut queue = JobQueue::new();
        queue.push_back(composite(1));
        let parent = queue.insert_detached(composite(2));
        queue.push_front_all(vec![leaf(3, parent), leaf(4, parent)]);

        let mut seen = Vec::new();
        while let Some(key) = queue.head() {
            seen.push(queue.get(key).unwrap().id().get());
            queue.remove(key);
        }
        assert_eq!(seen, vec![3, 4, 1]);
        assert_eq!(queue.len(), 1);

        queue.requeue_front(parent);
        assert_eq!(queue.head_id(), Some(JobId::new(2)));
    }

    #[test]
    fn test_stale_key_after_reuse() {
        let mut queue = JobQueue::new();
        let old = queue.push_back(composite(1));
        queue.remove(old);
        let new = queue.push_back(composite(2));
        assert!(queue.get(old).is_none());
        assert_eq!(queue.get(new).map(Job::id), Some(JobId::new(2)));
    }

    #[test]
    fn test_drain_takes_detached_jobs() {
        let mut queue = JobQueue::new();
        queue.push_back(composite(1));
        queue.insert_detached(composite(2));
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.head().is_none());
    }
}
