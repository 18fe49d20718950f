#![cfg(all(unix, feature = "cli"))]

use std::collections::HashSet;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn job_stream(count: usize) -> Vec<u8> {
    let mut wire = Vec::new();
    for id in 0..count {
        let header = format!(r#"{{"id":{id}}}"#);
        let body = format!("job-{id}");
        wire.extend_from_slice(format!("{},{}:", header.len(), body.len()).as_bytes());
        wire.extend_from_slice(header.as_bytes());
        wire.extend_from_slice(body.as_bytes());
    }
    wire
}

fn run_pool(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_wirepool"))
        .args(["--log-level", "error", "--format", "json", "pool"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("wirepool should start");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin)
        .expect("stdin should accept input");
    child.wait_with_output().expect("wirepool should exit")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect()
}

#[test]
fn pool_processes_every_job_once() {
    let output = run_pool(&["--workers", "5", "--queue-pairs", "2"], &job_stream(200));
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let results = json_lines(&output);
    assert_eq!(results.len(), 200);

    let ids: HashSet<u64> = results
        .iter()
        .map(|r| r["header"]["id"].as_u64().expect("id should survive"))
        .collect();
    assert_eq!(ids.len(), 200);

    let workers: HashSet<&str> = results
        .iter()
        .map(|r| r["header"]["worker"].as_str().expect("worker tag"))
        .collect();
    assert!(workers
        .iter()
        .all(|name| name.starts_with("wirepool-worker-")));
}

#[test]
fn headerless_jobs_fail_without_stopping_the_pool() {
    let mut wire = job_stream(3);
    wire.extend_from_slice(b"0,4:oops");

    let output = run_pool(&["--workers", "1", "--queue-pairs", "1"], &wire);
    assert_eq!(output.status.code(), Some(1));

    let results = json_lines(&output);
    assert_eq!(results.len(), 4);
    let failures: Vec<_> = results.iter().filter(|r| r.get("error").is_some()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["worker"], 0);
    assert_eq!(failures[0]["panicked"], false);
}

#[test]
fn pool_reads_config_file() {
    let dir = std::env::temp_dir().join(format!("wirepool-cli-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("pool.json");
    std::fs::write(&path, r#"{"JobsResultsQueueNum": 3, "MaxWorkerSize": 2}"#)
        .expect("config should be writable");

    let output = run_pool(
        &["--config", path.to_str().expect("utf-8 path"), "--queue-pairs", "2"],
        &job_stream(20),
    );
    assert!(output.status.success());
    assert_eq!(json_lines(&output).len(), 20);

    std::fs::write(&path, r#"{"MaxWorkerSize": 0}"#).expect("config should be writable");
    let output = run_pool(&["--config", path.to_str().expect("utf-8 path")], b"");
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_input_succeeds() {
    let output = run_pool(&["--workers", "2"], b"");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn more_pairs_than_workers_is_a_usage_error() {
    let output = run_pool(&["--workers", "1", "--queue-pairs", "2"], b"");
    assert_eq!(output.status.code(), Some(64));
    assert!(output.stdout.is_empty());
}

#[test]
fn single_worker_uses_a_single_pair() {
    let output = run_pool(&["--workers", "1"], &job_stream(4));
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(json_lines(&output).len(), 4);
}
