//! Command-line client executor
//!
//! One process per attempt. The attempt is timed from spawn to exit, so the
//! client's own startup is part of the measurement.

use querybench_core::{ExecutionResult, ExecutorError, QueryExecutor, QueryRecord, Stopwatch};
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;

/// Placeholder substituted with the query text in arguments
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Runs a client program once per attempt
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandExecutor {
    /// Client `program` with `args`.
    ///
    /// When no argument contains `{query}`, the query text is appended as the
    /// last argument.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
        }
    }

    /// Extra environment variables for the client
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_for(&self, query: &str) -> Command {
        let mut command = Command::new(&self.program);
        if self.args.iter().any(|a| a.contains(QUERY_PLACEHOLDER)) {
            command.args(self.args.iter().map(|a| a.replace(QUERY_PLACEHOLDER, query)));
        } else {
            command.args(&self.args).arg(query);
        }
        command.envs(&self.env);
        command
    }
}

impl QueryExecutor for CommandExecutor {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        let watch = Stopwatch::start();
        let output = self
            .command_for(record.query())
            .output()
            .map_err(|source| ExecutorError::Launch {
                program: self.program.clone(),
                source,
            })?;
        let timing = watch.stop();

        let result = if output.status.success() {
            ExecutionResult::success(record.clone(), timing.duration)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.program, output.status),
                trimmed => trimmed.to_string(),
            };
            ExecutionResult::fail(record.clone(), message)
        };

        Ok(result.with_timing(Some(timing.started_at), Some(timing.finished_at)))
    }
}
