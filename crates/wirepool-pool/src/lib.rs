//! Worker pool over a fixed set of job/result queue pairs.
//!
//! A pool owns `Q` queue pairs and runs `W` worker threads. Worker `i` serves
//! pair `min(i, Q - 1)`. Producers push onto [`WorkerPool::jobs`] and
//! consumers pull from [`WorkerPool::results`]; each call rotates to the next
//! pair.
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use wirepool_pool::{BoxError, WorkerPool};
//!
//! let mut pool = WorkerPool::new(|n: u64| Ok::<_, BoxError>(n * 2), 2, 4)?;
//! pool.start()?;
//! for n in 0..10 {
//!     pool.submit(n)?;
//! }
//! let mut seen = 0;
//! pool.handle_results(|_| {
//!     seen += 1;
//!     if seen == 10 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! })?;
//! pool.stop()?;
//! # Ok::<(), wirepool_pool::PoolError>(())
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod queue;
mod worker;

pub use config::{PoolConfig, DEFAULT_POLL_INTERVAL};
pub use error::{BoxError, JobFailure, JobResult, PoolError, Result};
pub use pool::{StopReport, WorkerPool};
pub use queue::{assigned_queue_pair, JobQueue, PoolStats, ResultQueue};
pub use worker::{ShutdownSignal, WorkerStatus};
