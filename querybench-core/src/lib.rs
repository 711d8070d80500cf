#![warn(missing_docs)]
//! QueryBench Core - Execution Engine
//!
//! This crate provides the engine-agnostic benchmark machinery:
//! - Query records, batches and per-attempt results
//! - The `QueryExecutor` contract engine clients implement
//! - `BenchmarkRunner`, which health-checks an engine and runs its batches on a bounded pool
//! - Output sinks and the delimited artifact layout

mod executor;
mod measure;
mod model;
mod runner;
mod sink;

pub use executor::{ExecutorError, QueryExecutor};
pub use measure::{Stopwatch, Timing};
pub use model::{
    ExecutionResult, JobInfo, ModelError, Outcome, QueryBatch, QueryRecord, Status, UNKNOWN_ERROR,
    parse_repeat_count,
};
pub use runner::{
    BatchOutcome, BenchmarkRunner, CHECK_DESCRIPTION, CHECK_QUERY_ID, EngineSpec, RunnerError,
    RunnerState,
};
pub use sink::{
    ARTIFACT_TIMESTAMP_FORMAT, MemoryArtifacts, MemorySink, MemorySinkFactory, OutputSink,
    ResultShape, SinkError, SinkFactory, TIMESTAMP_FORMAT, artifact_name, write_artifact,
};
