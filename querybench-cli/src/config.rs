//! Configuration loading from querybench.toml
//!
//! The configuration is discovered by walking up from the current directory,
//! or passed explicitly with `--config`. Engines are the keys of the
//! `[engines]` table; each one names its connectivity-check query, its
//! artifact shape and the client used to reach it.

use crate::engine::TimingSource;
use querybench_core::{EngineSpec, ResultShape};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up by [`QueryBenchConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "querybench.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Engine {engine}: missing required setting `{key}`")]
    MissingSetting { engine: String, key: &'static str },

    #[error("Invalid duration `{value}`: {reason}")]
    InvalidDuration { value: String, reason: String },
}

/// QueryBench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryBenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Engines by name
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
}

/// Settings shared by every engine runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Worker threads per engine
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Directory scanned for `{engine}-{description}.txt` query files
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
    /// Directory receiving one artifact per batch
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_pool_size() -> usize {
    1
}
fn default_input_dir() -> String {
    "queries".to_string()
}
fn default_output_dir() -> String {
    "results".to_string()
}

/// One engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Query used to check connectivity before running batches
    #[serde(default)]
    pub check_query: Option<String>,
    /// Artifact column layout: "standard" or "job"
    #[serde(default)]
    pub shape: ResultShape,
    /// Client used to reach the engine
    #[serde(default)]
    pub executor: Option<ExecutorConfig>,
}

/// Client kind and its settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutorConfig {
    /// Run a client program once per attempt
    Command(CommandConfig),
    /// Submit over the HTTP statement protocol and poll until completion
    Statement(StatementConfig),
}

/// Command-line client settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to launch
    #[serde(default)]
    pub program: Option<String>,
    /// Arguments; `{query}` is replaced with the query text
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// HTTP statement protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementConfig {
    /// Coordinator base URL, e.g. `http://localhost:8080`
    #[serde(default)]
    pub url: Option<String>,
    /// Session user
    #[serde(default)]
    pub user: Option<String>,
    /// Password for basic auth; empty disables it
    #[serde(default)]
    pub password: String,
    /// Default catalog
    #[serde(default)]
    pub catalog: Option<String>,
    /// Default schema
    #[serde(default)]
    pub schema: Option<String>,
    /// Delay between completion polls (e.g. "500ms", "1s")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Duration source for successful attempts: "client" or "engine"
    #[serde(default)]
    pub timing: TimingSource,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            password: String::new(),
            catalog: None,
            schema: None,
            poll_interval: default_poll_interval(),
            timing: TimingSource::default(),
        }
    }
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

/// Return a required string setting, treating blank values as missing
pub(crate) fn require<'a>(
    engine: &str,
    key: &'static str,
    value: Option<&'a String>,
) -> Result<&'a str, ConfigError> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingSetting {
            engine: engine.to_string(),
            key,
        }),
    }
}

impl EngineConfig {
    /// Runner-facing settings of engine `name`
    pub fn engine_spec(&self, name: &str) -> Result<EngineSpec, ConfigError> {
        let check_query = require(name, "check_query", self.check_query.as_ref())?;
        Ok(EngineSpec::new(name, check_query, self.shape))
    }
}

impl QueryBenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find `querybench.toml` by walking up from the current directory
    pub fn discover() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# QueryBench Configuration

[runner]
# Worker threads per engine; records of a batch run concurrently up to this bound
pool_size = 1
# Directory holding {engine}-{description}.txt query files
input_dir = "queries"
# Directory receiving one artifact per batch
output_dir = "results"

# One table per engine. The table key is the engine name used in query file names.

[engines.hive]
# Checked before any batch; a failure excludes the engine from the run
check_query = "SHOW TABLES"
# Artifact layout: "standard" or "job"
shape = "standard"

[engines.hive.executor]
# Launch a client program per attempt; {query} is replaced with the query text
kind = "command"
program = "beeline"
args = ["-u", "jdbc:hive2://localhost:10000/default", "--silent=true", "-e", "{query}"]

[engines.presto]
check_query = "SELECT 1"
shape = "job"

[engines.presto.executor]
# Submit over the HTTP statement protocol and poll until the query finishes
kind = "statement"
url = "http://localhost:8080"
user = "querybench"
# Empty password disables basic auth
password = ""
catalog = "hive"
schema = "default"
poll_interval = "1s"
# "client" times submit-to-completion, "engine" uses the engine's reported elapsed time
timing = "client"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m")
    pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDuration {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty duration"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = trimmed
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| trimmed.split_at(i))
            .unwrap_or((trimmed, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| invalid("not a number"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("must be a non-negative number"));
        }

        let seconds_per_unit = match unit_part.to_lowercase().as_str() {
            "ms" => 0.001,
            "s" => 1.0,
            "m" | "min" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid("unknown unit")),
        };

        Ok(Duration::from_secs_f64(value * seconds_per_unit))
    }
}
