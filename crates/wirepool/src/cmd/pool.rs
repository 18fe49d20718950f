use std::io;
use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::info;
use wirepool_frame::{Frame, FrameError, FrameReader};
use wirepool_pool::{BoxError, PoolConfig, ShutdownSignal, WorkerPool};

use crate::cmd::PoolArgs;
use crate::exit::{
    frame_error, pool_error, CliError, CliResult, DATA_INVALID, FAILURE, INTERNAL, SUCCESS, USAGE,
};
use crate::output::{print_failure, print_frame, OutputFormat};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    delivered: usize,
    failed: usize,
}

pub fn run(args: PoolArgs, format: OutputFormat) -> CliResult<i32> {
    let config = resolve_config(&args)?;
    let work = Duration::from_millis(args.work_ms);
    let jobs = read_jobs(io::stdin().lock())?;
    let total = jobs.len();

    let mut pool = WorkerPool::with_config(move |frame: Frame| process(frame, work), config)
        .map_err(|err| pool_error("pool setup failed", err))?;
    install_ctrlc_handler(pool.shutdown_signal())?;
    pool.start()
        .map_err(|err| pool_error("pool start failed", err))?;

    let tally = run_jobs(&pool, jobs, format);
    let report = pool
        .stop()
        .map_err(|err| pool_error("pool stop failed", err))?;
    let tally = tally?;

    let stats = pool.stats();
    info!(
        submitted = stats.submitted,
        completed = stats.completed,
        failed = stats.failed,
        discarded = stats.discarded,
        abandoned_jobs = report.abandoned_jobs,
        "pool finished"
    );

    if tally.failed > 0 || tally.delivered < total {
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}

fn resolve_config(args: &PoolArgs) -> CliResult<PoolConfig> {
    let mut config = match &args.config {
        Some(path) => PoolConfig::from_json_file(path)
            .map_err(|err| pool_error("config load failed", err))?,
        None => PoolConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.max_workers = count_arg("--workers", workers)?;
    }
    match args.queue_pairs {
        Some(pairs) => config.queue_pairs = count_arg("--queue-pairs", pairs)?,
        // Built-in default: one pair per worker at most.
        None if args.config.is_none() => {
            config.queue_pairs = config.queue_pairs.min(config.max_workers);
        }
        None => {}
    }

    // Jobs routed to a pair without a worker would never produce a result.
    if config.queue_pairs > config.max_workers {
        return Err(CliError::new(
            USAGE,
            format!(
                "{} queue pairs need at least as many workers, got {}",
                config.queue_pairs, config.max_workers
            ),
        ));
    }
    Ok(config)
}

fn count_arg(flag: &str, value: u64) -> CliResult<usize> {
    usize::try_from(value).map_err(|_| CliError::new(USAGE, format!("{flag} is too large")))
}

fn read_jobs(input: impl io::Read) -> CliResult<Vec<Frame>> {
    let mut reader = FrameReader::new(input);
    let jobs = reader
        .frames()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| match err {
            FrameError::ConnectionClosed => CliError::new(DATA_INVALID, "job input ended mid-frame"),
            other => frame_error("reading jobs failed", other),
        })?;
    info!(jobs = jobs.len(), "read job frames");
    Ok(jobs)
}

/// Submit every job from a producer thread while this thread drains results.
fn run_jobs(
    pool: &WorkerPool<Frame, Frame>,
    jobs: Vec<Frame>,
    format: OutputFormat,
) -> CliResult<Tally> {
    let total = jobs.len();
    if total == 0 {
        return Ok(Tally::default());
    }

    let signal = pool.shutdown_signal();
    let poll = pool.config().poll_interval;

    thread::scope(|scope| -> CliResult<Tally> {
        let producer = scope.spawn(move || -> wirepool_pool::Result<()> {
            for job in jobs {
                let queue = pool.jobs();
                let mut pending = job;
                loop {
                    if signal.is_raised() {
                        return Ok(());
                    }
                    match queue.push_timeout(pending, poll)? {
                        None => break,
                        Some(job) => pending = job,
                    }
                }
            }
            Ok(())
        });

        let mut tally = Tally::default();
        let handled = pool.handle_results(|result| {
            match result {
                Ok(frame) => print_frame(tally.delivered, &frame, format),
                Err(failure) => {
                    tally.failed += 1;
                    print_failure(tally.delivered, &failure, format);
                }
            }
            tally.delivered += 1;
            if tally.delivered == total {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        producer
            .join()
            .map_err(|_| CliError::new(INTERNAL, "job producer panicked"))?
            .map_err(|err| pool_error("submit failed", err))?;
        handled.map_err(|err| pool_error("result handling failed", err))?;
        Ok(tally)
    })
}

/// Job handler: tag the header with the worker that ran it and echo the body.
fn process(frame: Frame, work: Duration) -> Result<Frame, BoxError> {
    let Some(mut header) = frame.header else {
        return Err("job frame has no JSON header".into());
    };
    if !work.is_zero() {
        thread::sleep(work);
    }

    let worker = thread::current().name().unwrap_or("unnamed").to_string();
    header.insert("worker".to_string(), Value::String(worker));
    Frame::new(Some(header), frame.body).map_err(Into::into)
}

fn install_ctrlc_handler(signal: ShutdownSignal) -> CliResult<()> {
    ctrlc::set_handler(move || signal.raise()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn header(value: Value) -> Option<wirepool_frame::Header> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn process_tags_worker_and_keeps_body() {
        let job = Frame::new(header(json!({"id": 4})), &b"payload"[..]).unwrap();
        let out = thread::Builder::new()
            .name("wirepool-worker-9".to_string())
            .spawn(move || process(job, Duration::ZERO).unwrap())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(out.header_value("id"), Some(&json!(4)));
        assert_eq!(out.header_value("worker"), Some(&json!("wirepool-worker-9")));
        assert_eq!(out.body.as_ref(), b"payload");
    }

    #[test]
    fn process_rejects_headerless_jobs() {
        let job = Frame::new(None, &b"x"[..]).unwrap();
        let err = process(job, Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("no JSON header"));
    }

    #[test]
    fn read_jobs_reports_truncated_input() {
        let err = read_jobs(&b"2,3:{}ab"[..]).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);

        let jobs = read_jobs(&b"2,3:{}abc2,0:{}"[..]).unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn flags_override_config() {
        let args = PoolArgs {
            workers: Some(3),
            queue_pairs: Some(2),
            config: None,
            work_ms: 0,
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!((config.max_workers, config.queue_pairs), (3, 2));
    }

    #[test]
    fn workers_alone_caps_default_pairs() {
        let args = PoolArgs {
            workers: Some(1),
            queue_pairs: None,
            config: None,
            work_ms: 0,
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!((config.max_workers, config.queue_pairs), (1, 1));
    }

    #[test]
    fn unserved_pairs_are_rejected() {
        let args = PoolArgs {
            workers: Some(1),
            queue_pairs: Some(2),
            config: None,
            work_ms: 0,
        };
        let err = resolve_config(&args).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
