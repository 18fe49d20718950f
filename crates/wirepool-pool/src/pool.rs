use std::ops::ControlFlow;
use std::sync::Arc;

use crossbeam::channel::Select;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{BoxError, JobResult, PoolError, Result};
use crate::queue::{
    assigned_queue_pair, JobQueue, PoolCounters, PoolStats, QueuePair, ResultQueue, RoundRobin,
};
use crate::worker::{
    spawn_worker, Handler, ShutdownSignal, WorkerContext, WorkerHandle, WorkerStatus,
};

/// What `stop()` cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Worker threads joined by this call.
    pub workers_joined: usize,
    /// Jobs still queued when the pool stopped. They are never processed.
    pub abandoned_jobs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Fans jobs out over a fixed set of queue pairs served by worker threads.
///
/// The pool owns `Q` (job queue, result queue) pairs for its whole lifetime.
/// `start()` spawns `W` workers; worker `i` serves pair `min(i, Q - 1)`, so
/// surplus workers share the last pair and surplus pairs beyond `W` are never
/// served. Producers pick a job queue with [`jobs`](Self::jobs) and consumers
/// pick a result queue with [`results`](Self::results); both rotate
/// independently.
///
/// FIFO order holds within one pair only. Results carry no job identity, so
/// callers that need to correlate should put an id in `R`.
pub struct WorkerPool<J, R> {
    config: PoolConfig,
    pairs: Vec<QueuePair<J, R>>,
    workers: Vec<WorkerHandle>,
    handler: Handler<J, R>,
    job_cursor: RoundRobin,
    result_cursor: RoundRobin,
    shutdown: ShutdownSignal,
    counters: Arc<PoolCounters>,
    lifecycle: Lifecycle,
}

impl<J, R> WorkerPool<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Build a pool with `queue_pairs` queue pairs and `max_workers` workers.
    ///
    /// Remaining settings take [`PoolConfig`] defaults.
    pub fn new<F, E>(handler: F, queue_pairs: usize, max_workers: usize) -> Result<Self>
    where
        F: Fn(J) -> std::result::Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let config = PoolConfig {
            queue_pairs,
            max_workers,
            ..PoolConfig::default()
        };
        Self::with_config(handler, config)
    }

    /// Build a pool from an explicit configuration.
    pub fn with_config<F, E>(handler: F, config: PoolConfig) -> Result<Self>
    where
        F: Fn(J) -> std::result::Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        config.validate()?;

        let counters = Arc::new(PoolCounters::default());
        let pairs = (0..config.queue_pairs)
            .map(|index| QueuePair::new(index, config.queue_capacity, Arc::clone(&counters)))
            .collect();
        let handler: Handler<J, R> =
            Arc::new(move |job: J| -> std::result::Result<R, BoxError> {
                handler(job).map_err(Into::into)
            });

        Ok(Self {
            job_cursor: RoundRobin::new(config.queue_pairs),
            result_cursor: RoundRobin::new(config.queue_pairs),
            config,
            pairs,
            workers: Vec::new(),
            handler,
            shutdown: ShutdownSignal::new(),
            counters,
            lifecycle: Lifecycle::Created,
        })
    }

    /// Spawn the workers and return without waiting for them.
    pub fn start(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Running => return Err(PoolError::AlreadyStarted),
            Lifecycle::Stopped => return Err(PoolError::Stopped),
            Lifecycle::Created => {}
        }

        let queue_pairs = self.pairs.len();
        if self.config.max_workers < queue_pairs {
            debug!(
                workers = self.config.max_workers,
                queue_pairs, "some queue pairs have no worker"
            );
        }

        self.lifecycle = Lifecycle::Running;
        for index in 0..self.config.max_workers {
            let pair = &self.pairs[assigned_queue_pair(index, queue_pairs)];
            let ctx = WorkerContext {
                index,
                queue_pair: pair.jobs.index(),
                jobs: pair.jobs.receiver(),
                results: pair.results.sender(),
                handler: Arc::clone(&self.handler),
                shutdown: self.shutdown.clone(),
                poll_interval: self.config.poll_interval,
                counters: Arc::clone(&self.counters),
            };

            match spawn_worker(ctx) {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    warn!(worker = index, error = %err, "failed to spawn worker");
                    if let Err(stop_err) = self.stop() {
                        warn!(error = %stop_err, "stopping after failed spawn");
                    }
                    return Err(PoolError::Spawn(err));
                }
            }
        }

        info!(
            workers = self.workers.len(),
            queue_pairs, "worker pool started"
        );
        Ok(())
    }

    /// Next job queue in round-robin order.
    pub fn jobs(&self) -> &JobQueue<J> {
        &self.pairs[self.job_cursor.advance()].jobs
    }

    /// Push a job onto the next job queue. Returns the queue pair index used.
    ///
    /// Jobs submitted before `start()` wait in their queue until a worker
    /// picks them up.
    pub fn submit(&self, job: J) -> Result<usize> {
        if self.lifecycle == Lifecycle::Stopped {
            return Err(PoolError::Stopped);
        }
        let queue = self.jobs();
        queue.push(job)?;
        Ok(queue.index())
    }

    /// Next result queue in round-robin order.
    pub fn results(&self) -> &ResultQueue<R> {
        &self.pairs[self.result_cursor.advance()].results
    }

    /// Deliver results to `callback` until it breaks or the pool shuts down.
    ///
    /// Returns how many results were delivered. Idle waits block on every
    /// result queue at once for at most the configured poll interval.
    pub fn handle_results<F>(&self, mut callback: F) -> Result<usize>
    where
        F: FnMut(JobResult<R>) -> ControlFlow<()>,
    {
        if self.lifecycle == Lifecycle::Created {
            return Err(PoolError::NotStarted);
        }

        let mut select = Select::new();
        for pair in &self.pairs {
            select.recv(pair.results.receiver());
        }

        let mut delivered = 0;
        while !self.shutdown.is_raised() {
            let mut idle = true;
            for _ in 0..self.pairs.len() {
                if let Some(result) = self.results().try_pop() {
                    idle = false;
                    delivered += 1;
                    if callback(result).is_break() {
                        return Ok(delivered);
                    }
                }
            }
            if !idle {
                continue;
            }

            let Ok(op) = select.select_timeout(self.config.poll_interval) else {
                continue;
            };
            let receiver = self.pairs[op.index()].results.receiver();
            if let Ok(result) = op.recv(receiver) {
                delivered += 1;
                if callback(result).is_break() {
                    return Ok(delivered);
                }
            }
        }

        debug!(delivered, "result handling stopped by shutdown signal");
        Ok(delivered)
    }

    /// Signal shutdown and join every worker.
    ///
    /// A handler that is mid-call finishes first; its result is discarded.
    /// Calling `stop()` again returns an empty report.
    pub fn stop(&mut self) -> Result<StopReport> {
        if self.lifecycle == Lifecycle::Stopped {
            return Ok(StopReport::default());
        }
        self.lifecycle = Lifecycle::Stopped;
        self.shutdown.raise();

        let mut report = StopReport::default();
        let mut panicked = None;
        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            if thread.join().is_err() {
                warn!(worker = worker.index, name = %worker.name, "worker panicked");
                panicked.get_or_insert(worker.index);
                continue;
            }
            report.workers_joined += 1;
            info!(worker = worker.index, name = %worker.name, "worker joined");
        }

        report.abandoned_jobs = self.pairs.iter().map(|pair| pair.jobs.len()).sum();
        info!(
            workers_joined = report.workers_joined,
            abandoned_jobs = report.abandoned_jobs,
            "worker pool stopped"
        );

        match panicked {
            Some(worker) => Err(PoolError::WorkerPanicked { worker }),
            None => Ok(report),
        }
    }
}

impl<J, R> WorkerPool<J, R> {
    /// True between a successful `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Status of every spawned worker.
    ///
    /// Handles are kept after `stop()`; every status then reports not running.
    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.workers.iter().map(WorkerHandle::status).collect()
    }

    /// Counters for submitted, completed, failed and discarded jobs.
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Number of queue pairs, fixed at construction.
    pub fn queue_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Number of workers `start()` spawns.
    pub fn worker_count(&self) -> usize {
        self.config.max_workers
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Handle on the pool's shutdown flag.
    ///
    /// Raising it ends `handle_results` and winds workers down; `stop()` is
    /// still needed to join them.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}

impl<J, R> Drop for WorkerPool<J, R> {
    fn drop(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        self.lifecycle = Lifecycle::Stopped;
        self.shutdown.raise();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    fn fast_config(queue_pairs: usize, max_workers: usize) -> PoolConfig {
        PoolConfig {
            queue_pairs,
            max_workers,
            queue_capacity: None,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn echo(n: u64) -> std::result::Result<u64, BoxError> {
        Ok(n)
    }

    fn collect(pool: &WorkerPool<u64, u64>, want: usize) -> Vec<JobResult<u64>> {
        let mut got = Vec::with_capacity(want);
        let delivered = pool
            .handle_results(|result| {
                got.push(result);
                if got.len() == want {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(delivered, want);
        got
    }

    #[test]
    fn rejects_zero_counts() {
        assert!(matches!(
            WorkerPool::new(echo, 0, 4),
            Err(PoolError::InvalidConfig(_))
        ));
        assert!(matches!(
            WorkerPool::new(echo, 4, 0),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn fan_out_delivers_every_result_once() {
        let mut pool = WorkerPool::with_config(echo, fast_config(4, 6)).unwrap();
        pool.start().unwrap();

        for n in 0..1000 {
            pool.submit(n).unwrap();
        }

        let results = collect(&pool, 1000);
        let distinct: HashSet<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(distinct.len(), 1000);
        assert_eq!(distinct, (0..1000).collect::<HashSet<u64>>());

        let stats = pool.stats();
        assert_eq!(stats.submitted, 1000);
        assert_eq!(stats.completed, 1000);
        assert_eq!(stats.failed, 0);

        let report = pool.stop().unwrap();
        assert_eq!(report.workers_joined, 6);
        assert_eq!(report.abandoned_jobs, 0);
    }

    #[test]
    fn surplus_workers_share_last_pair() {
        let mut pool = WorkerPool::with_config(echo, fast_config(2, 5)).unwrap();
        pool.start().unwrap();

        let statuses = pool.worker_statuses();
        let pairs: Vec<_> = statuses.iter().map(|s| s.queue_pair).collect();
        assert_eq!(pairs, vec![0, 1, 1, 1, 1]);
        assert_eq!(statuses[3].name, "wirepool-worker-3");
        assert!(statuses.iter().all(|s| s.running));

        pool.stop().unwrap();
    }

    #[test]
    fn cursors_rotate_independently() {
        let pool = WorkerPool::with_config(echo, fast_config(3, 1)).unwrap();

        let jobs: Vec<_> = (0..4).map(|_| pool.jobs().index()).collect();
        assert_eq!(jobs, vec![0, 1, 2, 0]);

        let results: Vec<_> = (0..2).map(|_| pool.results().index()).collect();
        assert_eq!(results, vec![0, 1]);

        assert_eq!(pool.submit(9).unwrap(), 1);
    }

    #[test]
    fn start_is_one_shot() {
        let mut pool = WorkerPool::with_config(echo, fast_config(1, 1)).unwrap();
        pool.start().unwrap();
        assert!(matches!(pool.start(), Err(PoolError::AlreadyStarted)));

        pool.stop().unwrap();
        assert!(matches!(pool.start(), Err(PoolError::Stopped)));
        assert!(matches!(pool.submit(1), Err(PoolError::Stopped)));
    }

    #[test]
    fn handle_results_requires_start() {
        let pool = WorkerPool::with_config(echo, fast_config(1, 1)).unwrap();
        assert!(matches!(
            pool.handle_results(|_| ControlFlow::Continue(())),
            Err(PoolError::NotStarted)
        ));
    }

    #[test]
    fn jobs_queued_before_start_are_processed() {
        let mut pool = WorkerPool::with_config(echo, fast_config(2, 2)).unwrap();
        for n in 0..10 {
            pool.submit(n).unwrap();
        }
        pool.start().unwrap();

        let results = collect(&pool, 10);
        assert!(results.iter().all(|r| r.is_ok()));
        pool.stop().unwrap();
    }

    #[test]
    fn failures_and_panics_become_results() {
        let handler = |n: u64| -> std::result::Result<u64, BoxError> {
            match n % 3 {
                0 => Err(format!("job {n} rejected").into()),
                1 => panic!("job {n} exploded"),
                _ => Ok(n),
            }
        };
        let mut pool = WorkerPool::with_config(handler, fast_config(1, 1)).unwrap();
        pool.start().unwrap();

        for n in 0..9 {
            pool.submit(n).unwrap();
        }
        let results = collect(&pool, 9);

        let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(failures.len(), 6);
        assert_eq!(failures.iter().filter(|f| f.panicked).count(), 3);
        assert!(failures.iter().all(|f| f.worker == 0 && f.queue_pair == 0));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);

        let stats = pool.stats();
        assert_eq!((stats.completed, stats.failed), (3, 6));
        assert!(pool.worker_statuses()[0].running);
        pool.stop().unwrap();
    }

    #[test]
    fn stop_is_terminal() {
        let started = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&started);
        let handler = move |n: u64| -> std::result::Result<u64, BoxError> {
            seen.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(n)
        };
        let mut pool = WorkerPool::with_config(handler, fast_config(2, 2)).unwrap();
        pool.start().unwrap();
        for n in 0..20 {
            pool.submit(n).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while started.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let report = pool.stop().unwrap();
        assert_eq!(report.workers_joined, 2);
        assert!(report.abandoned_jobs > 0);
        assert!(!pool.is_running());
        let statuses = pool.worker_statuses();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.running));

        let queued: usize = (0..2).map(|_| pool.results().len()).sum();
        thread::sleep(Duration::from_millis(100));
        let later: usize = (0..2).map(|_| pool.results().len()).sum();
        assert_eq!(queued, later);
        assert!(pool.stats().discarded >= 1);

        assert_eq!(pool.stop().unwrap(), StopReport::default());
    }

    #[test]
    fn stop_returns_with_undrained_bounded_results() {
        let config = PoolConfig {
            queue_capacity: Some(2),
            ..fast_config(1, 1)
        };
        let mut pool = WorkerPool::with_config(echo, config).unwrap();
        pool.start().unwrap();
        for n in 0..4 {
            pool.submit(n).unwrap();
        }
        thread::sleep(Duration::from_millis(100));

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let stopper = thread::spawn(move || {
            let report = pool.stop();
            let _ = done_tx.send(());
            (pool, report)
        });
        done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("stop should not hang on a full result queue");

        let (pool, report) = stopper.join().unwrap();
        let report = report.unwrap();
        assert_eq!(report.workers_joined, 1);
        assert_eq!(pool.results().len(), 2);

        let stats = pool.stats();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.discarded, 1);
        assert_eq!(report.abandoned_jobs, 1);
    }

    #[test]
    fn shutdown_signal_ends_result_handling() {
        let mut pool = WorkerPool::with_config(echo, fast_config(2, 1)).unwrap();
        pool.start().unwrap();

        let signal = pool.shutdown_signal();
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            signal.raise();
        });

        let delivered = pool.handle_results(|_| ControlFlow::Continue(())).unwrap();
        assert_eq!(delivered, 0);
        raiser.join().unwrap();
        pool.stop().unwrap();
    }

    #[test]
    fn unserved_pairs_keep_their_jobs() {
        let mut pool = WorkerPool::with_config(echo, fast_config(3, 1)).unwrap();
        pool.start().unwrap();

        for n in 0..6 {
            pool.submit(n).unwrap();
        }
        let results = collect(&pool, 2);
        assert!(results.iter().all(|r| r.is_ok()));

        let report = pool.stop().unwrap();
        assert_eq!(report.abandoned_jobs, 4);
    }

    #[test]
    fn drop_stops_running_pool() {
        let mut pool = WorkerPool::with_config(echo, fast_config(2, 3)).unwrap();
        pool.start().unwrap();
        pool.submit(1).unwrap();

        let started = Instant::now();
        drop(pool);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
