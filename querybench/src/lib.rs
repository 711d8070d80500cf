#![warn(missing_docs)]
//! # QueryBench
//!
//! Benchmarking harness for SQL query engines. Every engine gets its own
//! runner: a connectivity check first, then each batch of queries executed on
//! a bounded worker pool, with one pipe-delimited artifact per batch.
//!
//! - **Engine-agnostic core**: anything implementing [`QueryExecutor`] can be benchmarked
//! - **Bounded concurrency**: records of a batch run in parallel up to the pool size
//! - **Per-attempt results**: repeat counts produce one row per attempt, failures included
//! - **Stable artifacts**: fixed header per engine shape, tag columns echoed from the input
//!
//! ## Custom executor
//!
//! ```
//! use querybench::{
//!     BenchmarkRunner, EngineSpec, ExecutionResult, ExecutorError, MemorySinkFactory,
//!     QueryBatch, QueryExecutor, QueryRecord, ResultShape,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Instant;
//!
//! impl QueryExecutor for Instant {
//!     fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
//!         Ok(ExecutionResult::success(record.clone(), Duration::from_millis(1)))
//!     }
//! }
//!
//! let record = QueryRecord::new("q1", "demo", "smoke", "SELECT 1", 3);
//! let batch = QueryBatch::new("demo", "smoke", Vec::new(), vec![record]).unwrap();
//! let sinks = MemorySinkFactory::new();
//!
//! let mut runner = BenchmarkRunner::new(
//!     EngineSpec::new("demo", "SELECT 1", ResultShape::Standard),
//!     vec![batch],
//!     Instant,
//!     sinks.clone(),
//!     2,
//! )
//! .unwrap();
//! runner.check_connection().unwrap();
//! let outcomes = runner.run_queries().unwrap();
//! let smoke = outcomes[0].as_ref().unwrap();
//!
//! assert_eq!(smoke.results.len(), 3);
//! assert_eq!(sinks.artifacts().len(), 1);
//! ```

// Re-export core types
pub use querybench_core::{
    BatchOutcome, BenchmarkRunner, EngineSpec, ExecutionResult, ExecutorError, JobInfo,
    MemorySinkFactory, Outcome, OutputSink, QueryBatch, QueryExecutor, QueryRecord, ResultShape,
    RunnerError, RunnerState, SinkError, SinkFactory, Status,
};

// Re-export stats
pub use querybench_stats::{LatencySummary, compute_summary};

// Re-export reporting
pub use querybench_report::{
    BatchSummary, DirectorySinkFactory, EngineSummary, OutputFormat, RunSummary, summarize_batch,
};

/// Run the QueryBench CLI.
///
/// ```ignore
/// fn main() {
///     querybench::run().unwrap();
/// }
/// ```
pub use querybench_cli::run;
