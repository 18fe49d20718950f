use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};

use crate::error::{JobResult, PoolError, Result};

/// Queue pair a worker attaches to.
///
/// Workers beyond the last pair are clamped onto it and share its queues.
pub fn assigned_queue_pair(worker_index: usize, queue_pairs: usize) -> usize {
    worker_index.min(queue_pairs.saturating_sub(1))
}

/// Shared counters updated by queues and workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) discarded: AtomicU64,
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs pushed onto any job queue.
    pub submitted: u64,
    /// Jobs whose handler succeeded and whose result was queued.
    pub completed: u64,
    /// Jobs whose handler failed or panicked; a `JobFailure` was queued.
    pub failed: u64,
    /// Jobs finished after shutdown was signalled; their results were dropped.
    pub discarded: u64,
}

impl PoolCounters {
    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Input side of a queue pair. Producers push jobs here.
pub struct JobQueue<J> {
    index: usize,
    tx: Sender<J>,
    rx: Receiver<J>,
    counters: Arc<PoolCounters>,
}

impl<J> JobQueue<J> {
    /// Index of the queue pair this queue belongs to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Enqueue a job. Blocks while a bounded queue is full.
    pub fn push(&self, job: J) -> Result<()> {
        self.tx.send(job).map_err(|_| PoolError::Disconnected)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueue a job, waiting at most `timeout` for room in a bounded queue.
    ///
    /// Returns `Ok(Some(job))` with the job handed back when the queue stayed full.
    pub fn push_timeout(&self, job: J, timeout: Duration) -> Result<Option<J>> {
        match self.tx.send_timeout(job, timeout) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(SendTimeoutError::Timeout(job)) => Ok(Some(job)),
            Err(SendTimeoutError::Disconnected(_)) => Err(PoolError::Disconnected),
        }
    }

    /// Jobs waiting to be picked up by a worker.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn receiver(&self) -> Receiver<J> {
        self.rx.clone()
    }
}

/// Output side of a queue pair. Consumers pop results here.
pub struct ResultQueue<R> {
    index: usize,
    tx: Sender<JobResult<R>>,
    rx: Receiver<JobResult<R>>,
}

impl<R> ResultQueue<R> {
    /// Index of the queue pair this queue belongs to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Take one result if one is ready.
    pub fn try_pop(&self) -> Option<JobResult<R>> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for one result.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<JobResult<R>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Results waiting to be consumed.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn sender(&self) -> Sender<JobResult<R>> {
        self.tx.clone()
    }

    pub(crate) fn receiver(&self) -> &Receiver<JobResult<R>> {
        &self.rx
    }
}

/// A job queue and its paired result queue.
pub(crate) struct QueuePair<J, R> {
    pub(crate) jobs: JobQueue<J>,
    pub(crate) results: ResultQueue<R>,
}

impl<J, R> QueuePair<J, R> {
    pub(crate) fn new(index: usize, capacity: Option<usize>, counters: Arc<PoolCounters>) -> Self {
        let (job_tx, job_rx) = channel(capacity);
        let (result_tx, result_rx) = channel(capacity);
        Self {
            jobs: JobQueue {
                index,
                tx: job_tx,
                rx: job_rx,
                counters,
            },
            results: ResultQueue {
                index,
                tx: result_tx,
                rx: result_rx,
            },
        }
    }
}

fn channel<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    match capacity {
        Some(cap) => bounded(cap),
        None => unbounded(),
    }
}

/// Cursor cycling through `[0, len)`.
#[derive(Debug)]
pub(crate) struct RoundRobin {
    next: AtomicUsize,
    len: usize,
}

impl RoundRobin {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            len: len.max(1),
        }
    }

    /// Return the current index and advance the cursor.
    pub(crate) fn advance(&self) -> usize {
        let len = self.len;
        match self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        }
    }
}
