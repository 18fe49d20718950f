//! Fan jobs out over a worker pool with more workers than queue pairs.
//!
//! Run with:
//!   cargo run -p wirepool --example pool-fanout

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

use wirepool::pool::{BoxError, WorkerPool};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut pool = WorkerPool::new(
        |n: u64| -> Result<(u64, String), BoxError> {
            thread::sleep(Duration::from_millis(5));
            let worker = thread::current().name().unwrap_or("?").to_string();
            Ok((n * n, worker))
        },
        2,
        5,
    )?;
    pool.start()?;

    for status in pool.worker_statuses() {
        eprintln!("{} -> queue pair {}", status.name, status.queue_pair);
    }

    const JOBS: usize = 100;
    for n in 0..JOBS as u64 {
        pool.submit(n)?;
    }

    let mut per_worker: BTreeMap<String, usize> = BTreeMap::new();
    let mut seen = 0;
    pool.handle_results(|result| {
        seen += 1;
        match result {
            Ok((_, worker)) => *per_worker.entry(worker).or_default() += 1,
            Err(failure) => eprintln!("job failed: {failure}"),
        }
        if seen == JOBS {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    let report = pool.stop()?;
    eprintln!("jobs per worker: {per_worker:?}");
    eprintln!("stats: {:?}, stop: {report:?}", pool.stats());
    Ok(())
}
