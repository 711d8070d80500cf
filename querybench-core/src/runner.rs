//! Benchmark Runner
//!
//! Executes every batch assigned to one engine on a bounded worker pool.
//!
//! ## Lifecycle
//!
//! ```text
//!   new() ──► ConnectionUnchecked
//!                  │ check_connection()
//!        ┌─────────┴──────────┐
//!        ▼                    ▼
//!  ConnectionOk ◄──────► ConnectionFailed      (re-checkable)
//!        │ run_queries()
//!        ▼
//!    Finished                                   (pool released)
//! ```
//!
//! ## Per-batch pipeline
//!
//! ```text
//! QueryBatch ──► one unit per record ──► rayon pool (pool_size threads)
//!                                              │  wait for all units
//!                                              ▼
//!                          flatten ──► artifact name ──► sink (write, close)
//! ```
//!
//! A unit runs its record's whole repeat loop, so slow or failing attempts of
//! one record never hold back unrelated records beyond the pool bound.

use crate::executor::{ExecutorError, QueryExecutor};
use crate::model::{ExecutionResult, QueryBatch, QueryRecord, Status};
use crate::sink::{ResultShape, SinkError, SinkFactory, artifact_name, write_artifact};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Identifier of the synthetic connectivity check
pub const CHECK_QUERY_ID: &str = "check";

/// Description of the synthetic connectivity check
pub const CHECK_DESCRIPTION: &str = "check-connection";

/// Per-engine settings the runner needs besides its executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    /// Engine name, used in logs and artifact names
    pub name: String,
    /// Query used to check connectivity
    pub check_query: String,
    /// Fixed column prefix of this engine's artifacts
    pub shape: ResultShape,
}

impl EngineSpec {
    /// Create an engine spec
    pub fn new(name: impl Into<String>, check_query: impl Into<String>, shape: ResultShape) -> Self {
        Self {
            name: name.into(),
            check_query: check_query.into(),
            shape,
        }
    }
}

/// Runner lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Constructed, connectivity not yet verified
    ConnectionUnchecked,
    /// Last connectivity check passed
    ConnectionOk,
    /// Last connectivity check failed
    ConnectionFailed,
    /// Batches executed, pool released
    Finished,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::ConnectionUnchecked => "connection-unchecked",
            RunnerState::ConnectionOk => "connection-ok",
            RunnerState::ConnectionFailed => "connection-failed",
            RunnerState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by [`BenchmarkRunner`]
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Engine {engine}: missing required setting `{key}`")]
    MissingSetting { engine: String, key: &'static str },

    #[error("Engine {engine}: invalid worker pool size {size} (must be >= 1)")]
    InvalidPoolSize { engine: String, size: usize },

    #[error("Engine {engine}: failed to build worker pool: {message}")]
    PoolBuild { engine: String, message: String },

    #[error("Checking connection for {engine} - ERROR - {message}")]
    ConnectionFailed { engine: String, message: String },

    #[error("Engine {engine} cannot run queries in state {state}")]
    NotReady { engine: String, state: RunnerState },

    #[error("Engine {engine}, batch {description}, query {query_id}: {source}")]
    Executor {
        engine: String,
        description: String,
        query_id: String,
        #[source]
        source: ExecutorError,
    },

    #[error("Engine {engine}, batch {description}: unit for query {query_id} panicked: {message}")]
    UnitPanicked {
        engine: String,
        description: String,
        query_id: String,
        message: String,
    },

    #[error("Engine {engine}, batch {description}: {source}")]
    Output {
        engine: String,
        description: String,
        #[source]
        source: SinkError,
    },
}

/// Aggregated output of one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Engine name
    pub engine: String,
    /// Batch description
    pub description: String,
    /// Name of the artifact written for this batch
    pub artifact: String,
    /// Every attempt of every record; attempt order is kept within a record
    pub results: Vec<ExecutionResult>,
}

impl BatchOutcome {
    /// Number of successful attempts
    pub fn successes(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status() == Status::Success)
            .count()
    }

    /// Number of failed attempts
    pub fn failures(&self) -> usize {
        self.results.len() - self.successes()
    }
}

/// Why a unit did not produce results
enum UnitError {
    Executor(ExecutorError),
    Panicked(String),
}

/// Health-checks one engine and executes its batches with bounded concurrency
pub struct BenchmarkRunner<E, F> {
    engine: EngineSpec,
    batches: Vec<QueryBatch>,
    executor: E,
    sinks: F,
    pool: Option<ThreadPool>,
    pool_size: usize,
    state: RunnerState,
    progress: bool,
}

impl<E: QueryExecutor, F: SinkFactory> BenchmarkRunner<E, F> {
    /// Create a runner and its worker pool.
    ///
    /// Fails when the engine has no name or no connectivity-check query, or
    /// when `pool_size` is zero.
    pub fn new(
        engine: EngineSpec,
        batches: Vec<QueryBatch>,
        executor: E,
        sinks: F,
        pool_size: usize,
    ) -> Result<Self, RunnerError> {
        if engine.name.trim().is_empty() {
            return Err(RunnerError::MissingSetting {
                engine: engine.name,
                key: "name",
            });
        }
        if engine.check_query.trim().is_empty() {
            return Err(RunnerError::MissingSetting {
                engine: engine.name,
                key: "check_query",
            });
        }
        if pool_size == 0 {
            return Err(RunnerError::InvalidPoolSize {
                engine: engine.name,
                size: pool_size,
            });
        }

        let thread_prefix = format!("querybench-{}", engine.name);
        let pool = ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(move |index| format!("{}-{}", thread_prefix, index))
            .build()
            .map_err(|e| RunnerError::PoolBuild {
                engine: engine.name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            engine,
            batches,
            executor,
            sinks,
            pool: Some(pool),
            pool_size,
            state: RunnerState::ConnectionUnchecked,
            progress: false,
        })
    }

    /// Show a progress bar per batch
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Engine settings
    pub fn engine(&self) -> &EngineSpec {
        &self.engine
    }

    /// Engine name
    pub fn engine_name(&self) -> &str {
        &self.engine.name
    }

    /// Batches assigned to this runner
    pub fn batches(&self) -> &[QueryBatch] {
        &self.batches
    }

    /// Worker pool size
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run the engine's connectivity-check query.
    ///
    /// Blocks until the check completes. Never writes an artifact.
    pub fn check_connection(&mut self) -> Result<(), RunnerError> {
        if self.state == RunnerState::Finished {
            return Err(RunnerError::NotReady {
                engine: self.engine.name.clone(),
                state: self.state,
            });
        }

        let check = Arc::new(QueryRecord::new(
            CHECK_QUERY_ID,
            self.engine.name.as_str(),
            CHECK_DESCRIPTION,
            self.engine.check_query.as_str(),
            1,
        ));

        let failure = match self.executor.execute_once(&check) {
            Ok(result) => result.error_message().map(str::to_string),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                self.state = RunnerState::ConnectionOk;
                info!(engine = %self.engine.name, "Checking connection - OK");
                Ok(())
            }
            Some(message) => {
                self.state = RunnerState::ConnectionFailed;
                Err(RunnerError::ConnectionFailed {
                    engine: self.engine.name.clone(),
                    message,
                })
            }
        }
    }

    /// Execute every batch, writing one artifact per batch.
    ///
    /// Requires a passed connection check. Batches run one after another,
    /// records within a batch run concurrently on the pool. Each batch gets
    /// its own result: an aborted batch writes no artifact and does not stop
    /// the batches after it. The pool is released afterwards.
    pub fn run_queries(&mut self) -> Result<Vec<Result<BatchOutcome, RunnerError>>, RunnerError> {
        if self.state != RunnerState::ConnectionOk {
            return Err(RunnerError::NotReady {
                engine: self.engine.name.clone(),
                state: self.state,
            });
        }

        let Some(pool) = self.pool.take() else {
            return Err(RunnerError::NotReady {
                engine: self.engine.name.clone(),
                state: self.state,
            });
        };
        self.state = RunnerState::Finished;

        if self.batches.is_empty() {
            info!(engine = %self.engine.name, "No query batches, nothing to run");
            return Ok(Vec::new());
        }

        let outcomes = self
            .batches
            .iter()
            .map(|batch| {
                self.run_batch(&pool, batch).inspect_err(|e| {
                    error!(engine = %self.engine.name, batch = %batch.description(), "Batch aborted: {}", e);
                })
            })
            .collect();

        drop(pool);
        Ok(outcomes)
    }

    fn run_batch(&self, pool: &ThreadPool, batch: &QueryBatch) -> Result<BatchOutcome, RunnerError> {
        let start = Instant::now();
        info!(
            engine = %self.engine.name,
            batch = %batch.description(),
            records = batch.records().len(),
            attempts = batch.total_attempts(),
            "Running batch"
        );

        let pb = self.progress_bar(batch);

        // Wait-for-all: every unit runs to completion before errors are looked at
        let units: Vec<(&Arc<QueryRecord>, Result<Vec<ExecutionResult>, UnitError>)> =
            pool.install(|| {
                batch
                    .records()
                    .par_iter()
                    .map(|record| {
                        let outcome = run_unit(&self.executor, record);
                        pb.inc(u64::from(record.repeat_count()));
                        (record, outcome)
                    })
                    .collect()
            });
        pb.finish_and_clear();

        let mut results = Vec::with_capacity(batch.total_attempts() as usize);
        for (record, outcome) in units {
            match outcome {
                Ok(unit_results) => {
                    if unit_results.len() != record.repeat_count() as usize {
                        warn!(
                            engine = %self.engine.name,
                            query_id = %record.id(),
                            expected = record.repeat_count(),
                            got = unit_results.len(),
                            "Executor returned an unexpected number of results"
                        );
                    }
                    results.extend(unit_results);
                }
                Err(UnitError::Executor(source)) => {
                    error!(
                        engine = %self.engine.name,
                        batch = %batch.description(),
                        query_id = %record.id(),
                        "Executor infrastructure error: {}",
                        source
                    );
                    return Err(RunnerError::Executor {
                        engine: self.engine.name.clone(),
                        description: batch.description().to_string(),
                        query_id: record.id().to_string(),
                        source,
                    });
                }
                Err(UnitError::Panicked(message)) => {
                    return Err(RunnerError::UnitPanicked {
                        engine: self.engine.name.clone(),
                        description: batch.description().to_string(),
                        query_id: record.id().to_string(),
                        message,
                    });
                }
            }
        }

        let artifact = artifact_name(&self.engine.name, batch.description(), Local::now());
        let output_error = |source| RunnerError::Output {
            engine: self.engine.name.clone(),
            description: batch.description().to_string(),
            source,
        };
        let sink = self.sinks.create(&artifact).map_err(output_error)?;
        write_artifact(sink, self.engine.shape, batch, &results).map_err(output_error)?;

        let outcome = BatchOutcome {
            engine: self.engine.name.clone(),
            description: batch.description().to_string(),
            artifact,
            results,
        };
        info!(
            engine = %self.engine.name,
            batch = %batch.description(),
            artifact = %outcome.artifact,
            successes = outcome.successes(),
            failures = outcome.failures(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch complete"
        );
        Ok(outcome)
    }

    fn progress_bar(&self, batch: &QueryBatch) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(batch.total_attempts());
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(format!("{}/{}", self.engine.name, batch.description()));
        pb
    }
}

/// Run one record's repeat loop, converting a panic into a unit error
fn run_unit<E: QueryExecutor>(
    executor: &E,
    record: &Arc<QueryRecord>,
) -> Result<Vec<ExecutionResult>, UnitError> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        executor.execute(record)
    }));

    match outcome {
        Ok(Ok(results)) => {
            for result in &results {
                if let Some(message) = result.error_message() {
                    error!(
                        engine = %record.engine(),
                        batch = %record.description(),
                        query_id = %record.id(),
                        "Attempt failed: {}",
                        message
                    );
                } else {
                    debug!(
                        engine = %record.engine(),
                        query_id = %record.id(),
                        duration_ms = result.duration().map(|d| d.as_millis() as u64),
                        "Attempt succeeded"
                    );
                }
            }
            Ok(results)
        }
        Ok(Err(e)) => Err(UnitError::Executor(e)),
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Err(UnitError::Panicked(message))
        }
    }
}
