//! Query Model
//!
//! Immutable descriptions of what to run and what came back:
//!
//! - [`QueryRecord`]: one query, how many times to repeat it, and opaque tag values
//! - [`QueryBatch`]: records sharing an engine and a description (usually one input file)
//! - [`ExecutionResult`]: the outcome of a single attempt, pointing back at its record

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised when assembling a batch
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error(
        "Batch {engine}/{description}: record {id} belongs to {record_engine}/{record_description}"
    )]
    ForeignRecord {
        engine: String,
        description: String,
        id: String,
        record_engine: String,
        record_description: String,
    },

    #[error("Batch {engine}/{description}: record {id} has {found} tag values, expected {expected}")]
    TagCountMismatch {
        engine: String,
        description: String,
        id: String,
        expected: usize,
        found: usize,
    },
}

/// Message recorded for a failed attempt that reported no error text
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Parse a repeat count from its textual form.
///
/// Anything that is not a non-negative integer falls back to 1, and 0 is
/// clamped to 1 so every record runs at least once.
pub fn parse_repeat_count(raw: &str) -> u32 {
    raw.trim().parse::<u32>().map(|count| count.max(1)).unwrap_or(1)
}

/// One query to run, and how many times
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    id: String,
    engine: String,
    description: String,
    query: String,
    repeat_count: u32,
    tag_values: Vec<String>,
}

impl QueryRecord {
    /// Create a record without tag values. A zero `repeat_count` is raised to 1.
    pub fn new(
        id: impl Into<String>,
        engine: impl Into<String>,
        description: impl Into<String>,
        query: impl Into<String>,
        repeat_count: u32,
    ) -> Self {
        Self {
            id: id.into(),
            engine: engine.into(),
            description: description.into(),
            query: query.into(),
            repeat_count: repeat_count.max(1),
            tag_values: Vec::new(),
        }
    }

    /// Attach the tag values echoed into the output after the fixed columns
    pub fn with_tag_values(mut self, tag_values: Vec<String>) -> Self {
        self.tag_values = tag_values;
        self
    }

    /// Identifier, unique within its batch
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine this record targets
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Label of the batch this record belongs to
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Query text passed verbatim to the executor
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Number of attempts, always at least 1
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Opaque metadata, one value per batch tag key
    pub fn tag_values(&self) -> &[String] {
        &self.tag_values
    }
}

/// Ordered group of records sharing an engine and a description
#[derive(Debug, Clone)]
pub struct QueryBatch {
    engine: String,
    description: String,
    tag_keys: Vec<String>,
    records: Vec<Arc<QueryRecord>>,
}

impl QueryBatch {
    /// Build a batch, checking that every record matches its engine, its
    /// description and its tag key count.
    pub fn new(
        engine: impl Into<String>,
        description: impl Into<String>,
        tag_keys: Vec<String>,
        records: Vec<QueryRecord>,
    ) -> Result<Self, ModelError> {
        let engine = engine.into();
        let description = description.into();

        for record in &records {
            if record.engine != engine || record.description != description {
                return Err(ModelError::ForeignRecord {
                    engine,
                    description,
                    id: record.id.clone(),
                    record_engine: record.engine.clone(),
                    record_description: record.description.clone(),
                });
            }
            if record.tag_values.len() != tag_keys.len() {
                return Err(ModelError::TagCountMismatch {
                    engine,
                    description,
                    id: record.id.clone(),
                    expected: tag_keys.len(),
                    found: record.tag_values.len(),
                });
            }
        }

        Ok(Self {
            engine,
            description,
            tag_keys,
            records: records.into_iter().map(Arc::new).collect(),
        })
    }

    /// Engine shared by every record
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Human-readable batch label
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Column names for the records' tag values
    pub fn tag_keys(&self) -> &[String] {
        &self.tag_keys
    }

    /// Records in input order
    pub fn records(&self) -> &[Arc<QueryRecord>] {
        &self.records
    }

    /// Total number of attempts across all records
    pub fn total_attempts(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.repeat_count)).sum()
    }
}

/// Attempt status as written to artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The engine completed the query
    Success,
    /// The engine or the client reported an error
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("SUCCESS"),
            Status::Fail => f.write_str("FAIL"),
        }
    }
}

/// What happened during one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Completed, with the measured duration
    Success {
        /// Wall-clock or engine-reported duration
        duration: Duration,
    },
    /// Failed, with the engine or client error
    Fail {
        /// Error message as reported
        message: String,
    },
}

/// Engine job metadata attached by warehouse-style executors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// Engine-assigned job or query identifier
    pub job_id: String,
    /// When the engine accepted the job
    pub created_at: DateTime<Local>,
}

/// Outcome of a single execution attempt
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    record: Arc<QueryRecord>,
    outcome: Outcome,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    job: Option<JobInfo>,
}

impl ExecutionResult {
    /// Successful attempt
    pub fn success(record: Arc<QueryRecord>, duration: Duration) -> Self {
        Self::with_outcome(record, Outcome::Success { duration })
    }

    /// Failed attempt. A blank message is replaced with [`UNKNOWN_ERROR`].
    pub fn fail(record: Arc<QueryRecord>, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = UNKNOWN_ERROR.to_string();
        }
        Self::with_outcome(record, Outcome::Fail { message })
    }

    fn with_outcome(record: Arc<QueryRecord>, outcome: Outcome) -> Self {
        Self {
            record,
            outcome,
            started_at: None,
            finished_at: None,
            job: None,
        }
    }

    /// Record the attempt's wall-clock boundaries
    pub fn with_timing(
        mut self,
        started_at: Option<DateTime<Local>>,
        finished_at: Option<DateTime<Local>>,
    ) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self
    }

    /// Attach engine job metadata
    pub fn with_job(mut self, job: JobInfo) -> Self {
        self.job = Some(job);
        self
    }

    /// The record this attempt ran
    pub fn record(&self) -> &Arc<QueryRecord> {
        &self.record
    }

    /// Success or failure
    pub fn status(&self) -> Status {
        match self.outcome {
            Outcome::Success { .. } => Status::Success,
            Outcome::Fail { .. } => Status::Fail,
        }
    }

    /// Full outcome
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Duration, present iff the attempt succeeded
    pub fn duration(&self) -> Option<Duration> {
        match self.outcome {
            Outcome::Success { duration } => Some(duration),
            Outcome::Fail { .. } => None,
        }
    }

    /// Error message, present iff the attempt failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Fail { message } => Some(message),
        }
    }

    /// When the attempt started, if known
    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    /// When the attempt finished, if known
    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    /// Engine job metadata, if the executor reports it
    pub fn job(&self) -> Option<&JobInfo> {
        self.job.as_ref()
    }
}
