//! Query Executor Contract
//!
//! The boundary between the runner and engine-specific client code.
//!
//! Executors turn ordinary query failures (bad SQL, engine errors, timeouts
//! reported by the engine) into [`ExecutionResult::fail`] values. Only
//! conditions that make every attempt impossible, such as a client program
//! that cannot be launched, surface as [`ExecutorError`], which aborts the
//! batch the record belongs to.

use crate::model::{ExecutionResult, QueryRecord};
use std::sync::Arc;
use thiserror::Error;

/// Infrastructure failure: the executor could not attempt the query at all
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Client initialization failed: {0}")]
    Client(String),
}

/// Runs queries against one engine.
///
/// Implementations are shared by every worker thread of a runner's pool, so
/// they must be `Send + Sync`. Calls block until the engine reports
/// completion; any polling happens inside the executor.
pub trait QueryExecutor: Send + Sync {
    /// Run one attempt of `record`
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError>;

    /// Run `record` its full repeat count, in order.
    ///
    /// Yields exactly `repeat_count` results unless an infrastructure error
    /// stops the loop, in which case no further attempts are made.
    fn execute(&self, record: &Arc<QueryRecord>) -> Result<Vec<ExecutionResult>, ExecutorError> {
        (0..record.repeat_count())
            .map(|_| self.execute_once(record))
            .collect()
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        (**self).execute_once(record)
    }

    fn execute(&self, record: &Arc<QueryRecord>) -> Result<Vec<ExecutionResult>, ExecutorError> {
        (**self).execute(record)
    }
}
