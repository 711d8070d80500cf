//! Engine Clients
//!
//! Maps each engine's `[engines.X.executor]` table to a concrete client:
//!
//! - `kind = "command"`: [`CommandExecutor`], a client program per attempt
//! - `kind = "statement"`: [`StatementExecutor`], HTTP submit-and-poll

mod command;
mod statement;

pub use command::{CommandExecutor, QUERY_PLACEHOLDER};
pub use statement::{
    HttpSettings, HttpTransport, StatementError, StatementExecutor, StatementPage,
    StatementStats, StatementTransport, TimingSource,
};

use crate::config::{ConfigError, EngineConfig, ExecutorConfig, QueryBenchConfig, require};
use querybench_core::{ExecutionResult, ExecutorError, QueryExecutor, QueryRecord};
use std::sync::Arc;
use thiserror::Error;

/// Why an engine's client could not be built
#[derive(Debug, Error)]
pub enum EngineSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Engine {engine}: {source}")]
    Executor {
        engine: String,
        #[source]
        source: ExecutorError,
    },
}

/// Client of any configured kind
#[derive(Debug, Clone)]
pub enum EngineExecutor {
    /// Client program per attempt
    Command(CommandExecutor),
    /// HTTP statement protocol
    Statement(StatementExecutor<HttpTransport>),
}

impl QueryExecutor for EngineExecutor {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        match self {
            EngineExecutor::Command(executor) => executor.execute_once(record),
            EngineExecutor::Statement(executor) => executor.execute_once(record),
        }
    }
}

/// Build the client of engine `name`
pub fn build_executor(name: &str, config: &EngineConfig) -> Result<EngineExecutor, EngineSetupError> {
    let missing = || ConfigError::MissingSetting {
        engine: name.to_string(),
        key: "executor",
    };

    match config.executor.as_ref().ok_or_else(missing)? {
        ExecutorConfig::Command(cmd) => {
            let program = require(name, "program", cmd.program.as_ref())?;
            Ok(EngineExecutor::Command(
                CommandExecutor::new(program, cmd.args.clone()).with_env(cmd.env.clone()),
            ))
        }
        ExecutorConfig::Statement(stmt) => {
            let settings = HttpSettings {
                url: require(name, "url", stmt.url.as_ref())?.to_string(),
                user: require(name, "user", stmt.user.as_ref())?.to_string(),
                password: stmt.password.clone(),
                catalog: stmt.catalog.clone(),
                schema: stmt.schema.clone(),
            };
            let poll_interval = QueryBenchConfig::parse_duration(&stmt.poll_interval)?;
            let transport =
                HttpTransport::new(settings).map_err(|source| EngineSetupError::Executor {
                    engine: name.to_string(),
                    source,
                })?;
            Ok(EngineExecutor::Statement(
                StatementExecutor::new(transport, poll_interval)
                    .with_timing_source(stmt.timing),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommandConfig, StatementConfig};
    use querybench_core::Status;

    fn engine(executor: ExecutorConfig) -> EngineConfig {
        EngineConfig {
            check_query: Some("SELECT 1".to_string()),
            executor: Some(executor),
            ..Default::default()
        }
    }

    #[test]
    fn test_builds_command_executor() {
        let config = engine(ExecutorConfig::Command(CommandConfig {
            program: Some("sh".to_string()),
            args: vec!["-c".to_string(), "{query}".to_string()],
            ..Default::default()
        }));

        let executor = build_executor("shell", &config).unwrap();
        let record = Arc::new(QueryRecord::new("q1", "shell", "smoke", "true", 1));

        assert!(matches!(executor, EngineExecutor::Command(_)));
        assert_eq!(executor.execute_once(&record).unwrap().status(), Status::Success);
    }

    #[test]
    fn test_statement_requires_user() {
        let config = engine(ExecutorConfig::Statement(StatementConfig {
            url: Some("http://localhost:8080".to_string()),
            ..Default::default()
        }));

        let err = build_executor("presto", &config).unwrap_err();
        assert!(matches!(
            err,
            EngineSetupError::Config(ConfigError::MissingSetting { key: "user", .. })
        ));
    }

    #[test]
    fn test_statement_rejects_bad_poll_interval() {
        let config = engine(ExecutorConfig::Statement(StatementConfig {
            url: Some("http://localhost:8080".to_string()),
            user: Some("bench".to_string()),
            poll_interval: "often".to_string(),
            ..Default::default()
        }));

        let err = build_executor("presto", &config).unwrap_err();
        assert!(matches!(
            err,
            EngineSetupError::Config(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_builds_statement_executor() {
        let config = engine(ExecutorConfig::Statement(StatementConfig {
            url: Some("http://localhost:8080".to_string()),
            user: Some("bench".to_string()),
            ..Default::default()
        }));

        let executor = build_executor("presto", &config).unwrap();
        assert!(matches!(executor, EngineExecutor::Statement(_)));
    }

    #[test]
    fn test_missing_executor_table() {
        let config = EngineConfig {
            check_query: Some("SELECT 1".to_string()),
            ..Default::default()
        };
        let err = build_executor("hive", &config).unwrap_err();
        assert!(err.to_string().contains("executor"));
    }
}
