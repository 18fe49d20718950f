use std::path::PathBuf;

/// Errors that can occur while configuring or driving a worker pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool configuration is unusable.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read pool config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a pool config.
    #[error("failed to parse pool config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// `start()` was called on a pool that is already running.
    #[error("worker pool already started")]
    AlreadyStarted,

    /// The operation requires running workers.
    #[error("worker pool not started")]
    NotStarted,

    /// The pool has been stopped and cannot be restarted.
    #[error("worker pool stopped")]
    Stopped,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// Every receiver of a queue has gone away.
    #[error("queue disconnected")]
    Disconnected,

    /// A worker thread terminated by panicking outside the job handler.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// A job that a worker accepted but could not complete.
///
/// Delivered on the result queue in place of the job's result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job failed on worker {worker} (queue pair {queue_pair}): {message}")]
pub struct JobFailure {
    /// Index of the worker that ran the job.
    pub worker: usize,
    /// Queue pair the job was taken from.
    pub queue_pair: usize,
    /// The handler's error message, or the panic message.
    pub message: String,
    /// True when the handler panicked rather than returning an error.
    pub panicked: bool,
}

/// What a worker pushes onto its result queue for each job.
pub type JobResult<R> = std::result::Result<R, JobFailure>;

/// Error type accepted from job handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
