use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tracing::{debug, warn};

use crate::error::{BoxError, JobFailure, JobResult};
use crate::queue::PoolCounters;

pub(crate) type Handler<J, R> = Arc<dyn Fn(J) -> Result<R, BoxError> + Send + Sync>;

/// Cloneable flag that tells workers and result drains to wind down.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub index: usize,
    pub queue_pair: usize,
    /// Thread name, `wirepool-worker-{index}`.
    pub name: String,
    pub running: bool,
}

pub(crate) struct WorkerHandle {
    pub(crate) index: usize,
    pub(crate) queue_pair: usize,
    pub(crate) name: String,
    pub(crate) thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn status(&self) -> WorkerStatus {
        WorkerStatus {
            index: self.index,
            queue_pair: self.queue_pair,
            name: self.name.clone(),
            running: self.thread.as_ref().is_some_and(|t| !t.is_finished()),
        }
    }
}

/// Everything a worker thread owns for its lifetime.
pub(crate) struct WorkerContext<J, R> {
    pub(crate) index: usize,
    pub(crate) queue_pair: usize,
    pub(crate) jobs: Receiver<J>,
    pub(crate) results: Sender<JobResult<R>>,
    pub(crate) handler: Handler<J, R>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) poll_interval: Duration,
    pub(crate) counters: Arc<PoolCounters>,
}

pub(crate) fn spawn_worker<J, R>(ctx: WorkerContext<J, R>) -> std::io::Result<WorkerHandle>
where
    J: Send + 'static,
    R: Send + 'static,
{
    let index = ctx.index;
    let queue_pair = ctx.queue_pair;
    let name = format!("wirepool-worker-{index}");
    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_worker(ctx))?;

    Ok(WorkerHandle {
        index,
        queue_pair,
        name,
        thread: Some(thread),
    })
}

/// Worker loop: take a job, run the handler, queue the outcome.
fn run_worker<J, R>(ctx: WorkerContext<J, R>) {
    debug!(
        worker = ctx.index,
        queue_pair = ctx.queue_pair,
        "worker started"
    );

    while !ctx.shutdown.is_raised() {
        let job = match ctx.jobs.recv_timeout(ctx.poll_interval) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let outcome = run_job(&ctx, job);
        if !deliver(&ctx, outcome) {
            break;
        }
    }

    debug!(worker = ctx.index, "worker exiting");
}

/// Queue one outcome on the result queue.
///
/// A full bounded queue is retried every poll interval until space frees up
/// or shutdown is signalled. Returns `false` when the worker should exit.
fn deliver<J, R>(ctx: &WorkerContext<J, R>, outcome: JobResult<R>) -> bool {
    let succeeded = outcome.is_ok();
    let mut pending = outcome;
    loop {
        // Results finished after shutdown was signalled are abandoned.
        if ctx.shutdown.is_raised() {
            ctx.counters.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(worker = ctx.index, "discarding result finished after shutdown");
            return false;
        }

        match ctx.results.send_timeout(pending, ctx.poll_interval) {
            Ok(()) => break,
            Err(SendTimeoutError::Timeout(outcome)) => pending = outcome,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }

    let counter = if succeeded {
        &ctx.counters.completed
    } else {
        &ctx.counters.failed
    };
    counter.fetch_add(1, Ordering::Relaxed);
    true
}

fn run_job<J, R>(ctx: &WorkerContext<J, R>, job: J) -> JobResult<R> {
    let handler = &ctx.handler;
    match panic::catch_unwind(AssertUnwindSafe(|| handler(job))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => {
            warn!(worker = ctx.index, error = %err, "job handler failed");
            Err(failure(ctx, err.to_string(), false))
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            warn!(worker = ctx.index, panic = %message, "job handler panicked");
            Err(failure(ctx, message, true))
        }
    }
}

fn failure<J, R>(ctx: &WorkerContext<J, R>, message: String, panicked: bool) -> JobFailure {
    JobFailure {
        worker: ctx.index,
        queue_pair: ctx.queue_pair,
        message,
        panicked,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
