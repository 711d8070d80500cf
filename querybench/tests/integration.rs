//! Integration tests for QueryBench
//!
//! End-to-end runs with deterministic executors writing real artifact files.

use querybench::{
    BatchOutcome, BenchmarkRunner, DirectorySinkFactory, EngineSpec, ExecutionResult, ExecutorError,
    QueryBatch, QueryExecutor, QueryRecord, ResultShape, RunnerError, RunnerState, SinkFactory,
    Status, summarize_batch,
};
use querybench_core::{CHECK_QUERY_ID, JobInfo, TIMESTAMP_FORMAT, UNKNOWN_ERROR};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Deterministic executor: durations derive from the query id, failures are
/// scripted per (query id, attempt)
#[derive(Default)]
struct Deterministic {
    failing: Vec<(&'static str, u32)>,
    check_fails: bool,
    with_jobs: bool,
    attempts: Mutex<HashMap<String, u32>>,
}

impl QueryExecutor for Deterministic {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        if record.id() == CHECK_QUERY_ID {
            return Ok(if self.check_fails {
                ExecutionResult::fail(record.clone(), "connection refused")
            } else {
                ExecutionResult::success(record.clone(), Duration::ZERO)
            });
        }

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(record.id().to_string()).or_insert(0);
            *n += 1;
            *n
        };

        let failed = self
            .failing
            .iter()
            .any(|&(id, n)| id == record.id() && n == attempt);
        let result = if failed {
            ExecutionResult::fail(record.clone(), format!("{} attempt {} failed", record.id(), attempt))
        } else {
            let millis = 10 * record.id().len() as u64;
            ExecutionResult::success(record.clone(), Duration::from_millis(millis))
        };

        if self.with_jobs {
            let now = chrono::Local::now();
            Ok(result.with_timing(Some(now), Some(now)).with_job(JobInfo {
                job_id: format!("job-{}-{}", record.id(), attempt),
                created_at: now,
            }))
        } else {
            Ok(result)
        }
    }
}

/// Sleeps a fixed delay per attempt and tracks peak concurrency
struct Sleepy {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl QueryExecutor for Sleepy {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        if record.id() == CHECK_QUERY_ID {
            return Ok(ExecutionResult::success(record.clone(), Duration::ZERO));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ExecutionResult::success(record.clone(), self.delay))
    }
}

fn tpch_batch(engine: &str) -> QueryBatch {
    let records = vec![
        QueryRecord::new("q1", engine, "tpch", "SELECT 1", 2)
            .with_tag_values(vec!["100".to_string(), "parquet".to_string()]),
        QueryRecord::new("q22", engine, "tpch", "SELECT 22", 3)
            .with_tag_values(vec!["100".to_string(), "orc".to_string()]),
    ];
    QueryBatch::new(
        engine,
        "tpch",
        vec!["scale".to_string(), "format".to_string()],
        records,
    )
    .unwrap()
}

fn run_all<E: QueryExecutor, F: SinkFactory>(
    runner: &mut BenchmarkRunner<E, F>,
) -> Vec<BatchOutcome> {
    runner
        .run_queries()
        .unwrap()
        .into_iter()
        .map(|outcome| outcome.unwrap())
        .collect()
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split('|').map(str::to_string).collect())
        .collect()
}

fn only_artifact(dir: &Path) -> std::path::PathBuf {
    let files: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1, "expected exactly one artifact in {}", dir.display());
    files.into_iter().next().unwrap()
}

/// Test that a run writes one artifact whose rows follow the standard layout
#[test]
fn test_standard_artifact_layout() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Deterministic {
        failing: vec![("q22", 2)],
        ..Default::default()
    };
    let mut runner = BenchmarkRunner::new(
        EngineSpec::new("hive", "SHOW TABLES", ResultShape::Standard),
        vec![tpch_batch("hive")],
        executor,
        DirectorySinkFactory::new(dir.path()),
        2,
    )
    .unwrap();

    runner.check_connection().unwrap();
    let outcomes = run_all(&mut runner);

    let path = only_artifact(dir.path());
    let name = path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name, outcomes[0].artifact);
    assert!(name.starts_with("hive-tpch-") && name.ends_with(".csv"));

    let rows = read_rows(&path);
    assert_eq!(
        rows[0],
        ["id", "status", "duration_ms", "start_time", "end_time", "error_message", "scale", "format"]
    );
    // Header + 2 + 3 attempts, constant width
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.len() == 8));

    // Attempts of one record stay in order
    let q22: Vec<_> = rows.iter().filter(|r| r[0] == "q22").collect();
    assert_eq!(q22.len(), 3);
    assert_eq!(q22[0][1], "SUCCESS");
    assert_eq!(q22[1][1], "FAIL");
    assert_eq!(q22[2][1], "SUCCESS");

    for row in &rows[1..] {
        match row[1].as_str() {
            "SUCCESS" => {
                assert!(!row[2].is_empty());
                assert!(row[5].is_empty());
            }
            "FAIL" => {
                assert!(row[2].is_empty());
                assert!(!row[5].is_empty());
            }
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(q22[0][2], "30");
    assert_eq!(q22[0][7], "orc");
}

/// Test the job shape carries job id and creation time
#[test]
fn test_job_artifact_layout() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Deterministic {
        with_jobs: true,
        ..Default::default()
    };
    let mut runner = BenchmarkRunner::new(
        EngineSpec::new("bigquery", "SELECT 1", ResultShape::Job),
        vec![tpch_batch("bigquery")],
        executor,
        DirectorySinkFactory::new(dir.path()),
        1,
    )
    .unwrap();
    runner.check_connection().unwrap();
    run_all(&mut runner);

    let rows = read_rows(&only_artifact(dir.path()));
    assert_eq!(
        &rows[0][..8],
        ["id", "job_id", "status", "duration_ms", "creation_time", "start_time", "end_time", "error_message"]
    );
    assert_eq!(rows[1][1], "job-q1-1");
    assert!(chrono::NaiveDateTime::parse_from_str(&rows[1][4], TIMESTAMP_FORMAT).is_ok());
    assert!(rows.iter().all(|r| r.len() == 10));
}

/// Fails every query without saying why
struct Silent;

impl QueryExecutor for Silent {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        if record.id() == CHECK_QUERY_ID {
            return Ok(ExecutionResult::success(record.clone(), Duration::ZERO));
        }
        Ok(ExecutionResult::fail(record.clone(), ""))
    }
}

/// Test that failed rows always carry an error message, even when the engine
/// gave none
#[test]
fn test_fail_rows_always_have_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = BenchmarkRunner::new(
        EngineSpec::new("bigquery", "SELECT 1", ResultShape::Job),
        vec![tpch_batch("bigquery")],
        Silent,
        DirectorySinkFactory::new(dir.path()),
        2,
    )
    .unwrap();
    runner.check_connection().unwrap();
    run_all(&mut runner);

    let rows = read_rows(&only_artifact(dir.path()));
    assert_eq!(rows.len(), 6);
    for row in &rows[1..] {
        assert_eq!(row[2], "FAIL");
        assert!(row[3].is_empty());
        assert_eq!(row[7], UNKNOWN_ERROR);
    }
}

/// Test that a failed connectivity check writes nothing and blocks the run
#[test]
fn test_failed_check_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("results");
    let executor = Deterministic {
        check_fails: true,
        ..Default::default()
    };
    let mut runner = BenchmarkRunner::new(
        EngineSpec::new("impala", "SELECT 1", ResultShape::Standard),
        vec![tpch_batch("impala")],
        executor,
        DirectorySinkFactory::new(&output),
        2,
    )
    .unwrap();

    let err = runner.check_connection().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Checking connection for impala - ERROR - connection refused"
    );
    assert_eq!(runner.state(), RunnerState::ConnectionFailed);
    assert!(matches!(runner.run_queries(), Err(RunnerError::NotReady { .. })));
    assert!(!output.exists());
}

/// Test that re-running with a deterministic executor reproduces the rows
/// apart from timestamps
#[test]
fn test_reruns_are_reproducible() {
    let run = |dir: &Path| {
        let executor = Deterministic {
            failing: vec![("q1", 1)],
            ..Default::default()
        };
        let mut runner = BenchmarkRunner::new(
            EngineSpec::new("presto", "SELECT 1", ResultShape::Standard),
            vec![tpch_batch("presto")],
            executor,
            DirectorySinkFactory::new(dir),
            2,
        )
        .unwrap();
        runner.check_connection().unwrap();
        run_all(&mut runner);

        let mut rows = read_rows(&only_artifact(dir));
        for row in &mut rows[1..] {
            // Drop timing columns
            row[3].clear();
            row[4].clear();
        }
        rows
    };

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    assert_eq!(run(first.path()), run(second.path()));
}

/// Test that two batches of five slow records on a pool of two never run more
/// than two at once and take at least five rounds
#[test]
fn test_pool_bounds_wall_clock() {
    let delay = Duration::from_millis(60);
    let batches: Vec<QueryBatch> = ["a", "b"]
        .iter()
        .map(|description| {
            let records = (1..=5)
                .map(|i| QueryRecord::new(format!("q{}", i), "X", *description, "SELECT 1", 1))
                .collect();
            QueryBatch::new("X", *description, Vec::new(), records).unwrap()
        })
        .collect();

    let sleepy = Arc::new(Sleepy {
        delay,
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let dir = tempfile::tempdir().unwrap();
    let mut runner = BenchmarkRunner::new(
        EngineSpec::new("X", "SELECT 1", ResultShape::Standard),
        batches,
        Arc::clone(&sleepy),
        DirectorySinkFactory::new(dir.path()),
        2,
    )
    .unwrap();
    runner.check_connection().unwrap();

    let start = Instant::now();
    let outcomes = run_all(&mut runner);
    let elapsed = start.elapsed();

    assert_eq!(outcomes.len(), 2);
    // ceil(5 / 2) rounds per batch, batches run one after another
    assert!(elapsed >= delay * 5, "elapsed {:?}", elapsed);
    assert!(sleepy.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

/// Test that summaries agree with the artifact
#[test]
fn test_summary_matches_results() {
    let executor = Deterministic {
        failing: vec![("q1", 2)],
        ..Default::default()
    };
    let sinks = querybench::MemorySinkFactory::new();
    let mut runner = BenchmarkRunner::new(
        EngineSpec::new("hive", "SELECT 1", ResultShape::Standard),
        vec![tpch_batch("hive")],
        executor,
        sinks.clone(),
        4,
    )
    .unwrap();
    runner.check_connection().unwrap();
    let outcomes = run_all(&mut runner);

    let summary = summarize_batch(&outcomes[0]);
    assert_eq!(summary.attempts, 5);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.queries[0].id, "q1");
    assert_eq!(summary.queries[0].successes, 1);
    assert_eq!(summary.queries[1].latency_ms.count, 3);
    assert!((summary.queries[1].latency_ms.mean - 30.0).abs() < 1e-9);

    let statuses: Vec<Status> = outcomes[0].results.iter().map(|r| r.status()).collect();
    assert_eq!(statuses.iter().filter(|s| **s == Status::Fail).count(), 1);
    assert_eq!(sinks.artifacts()[&summary.artifact].len(), 6);
}
