//! Output Sinks and Artifact Layout
//!
//! A sink receives already-stringified rows for one artifact and is closed
//! exactly once. The runner owns the layout: one header row (engine shape
//! columns followed by the batch tag keys), then one row per result with
//! missing optional fields rendered as empty strings.

use crate::model::{ExecutionResult, QueryBatch};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Timestamp format used inside artifacts
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

/// Timestamp format used in artifact names
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S%.3f";

/// Errors raised while producing an artifact
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {artifact}: {source}")]
    Io {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {artifact}: {message}")]
    Write { artifact: String, message: String },

    #[error("Artifact {artifact} already exists")]
    AlreadyExists { artifact: String },
}

/// Destination for the rows of one artifact
pub trait OutputSink {
    /// Append one row
    fn write_row(&mut self, row: &[String]) -> Result<(), SinkError>;

    /// Flush and release the artifact
    fn close(self) -> Result<(), SinkError>;
}

/// Opens a sink per artifact
pub trait SinkFactory: Send + Sync {
    /// Sink type produced by this factory
    type Sink: OutputSink;

    /// Open a new artifact named `artifact`
    fn create(&self, artifact: &str) -> Result<Self::Sink, SinkError>;
}

/// Fixed column prefix of an engine's artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// `id, status, duration_ms, start_time, end_time, error_message`
    #[default]
    Standard,
    /// Standard columns plus the engine's `job_id` and `creation_time`
    Job,
}

impl ResultShape {
    /// Fixed base columns for this shape
    pub fn base_columns(self) -> &'static [&'static str] {
        match self {
            ResultShape::Standard => &[
                "id",
                "status",
                "duration_ms",
                "start_time",
                "end_time",
                "error_message",
            ],
            ResultShape::Job => &[
                "id",
                "job_id",
                "status",
                "duration_ms",
                "creation_time",
                "start_time",
                "end_time",
                "error_message",
            ],
        }
    }

    /// Header row: base columns followed by the batch tag keys
    pub fn header(self, tag_keys: &[String]) -> Vec<String> {
        self.base_columns()
            .iter()
            .map(|c| c.to_string())
            .chain(tag_keys.iter().cloned())
            .collect()
    }

    /// Data row for one result, mirroring [`ResultShape::header`]
    pub fn row(self, result: &ExecutionResult) -> Vec<String> {
        let record = result.record();
        let duration = result
            .duration()
            .map(|d| d.as_millis().to_string())
            .unwrap_or_default();
        let started = format_timestamp(result.started_at());
        let finished = format_timestamp(result.finished_at());
        let error = result.error_message().unwrap_or_default().to_string();

        let mut row = Vec::with_capacity(self.base_columns().len() + record.tag_values().len());
        match self {
            ResultShape::Standard => {
                row.extend([
                    record.id().to_string(),
                    result.status().to_string(),
                    duration,
                    started,
                    finished,
                    error,
                ]);
            }
            ResultShape::Job => {
                let job_id = result
                    .job()
                    .map(|j| j.job_id.clone())
                    .unwrap_or_default();
                let created = format_timestamp(result.job().map(|j| j.created_at));
                row.extend([
                    record.id().to_string(),
                    job_id,
                    result.status().to_string(),
                    duration,
                    created,
                    started,
                    finished,
                    error,
                ]);
            }
        }
        row.extend(record.tag_values().iter().cloned());
        row
    }
}

impl std::str::FromStr for ResultShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(ResultShape::Standard),
            "job" => Ok(ResultShape::Job),
            other => Err(format!("Unknown result shape: {}", other)),
        }
    }
}

fn format_timestamp(ts: Option<DateTime<Local>>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Artifact name for one batch: `{engine}-{description}-{timestamp}.csv`
pub fn artifact_name(engine: &str, description: &str, at: DateTime<Local>) -> String {
    format!(
        "{}-{}-{}.csv",
        engine,
        description,
        at.format(ARTIFACT_TIMESTAMP_FORMAT)
    )
}

/// Write one batch through `sink` and close it.
///
/// The sink is closed on every path; a write error takes precedence over a
/// close error.
pub fn write_artifact<S: OutputSink>(
    mut sink: S,
    shape: ResultShape,
    batch: &QueryBatch,
    results: &[ExecutionResult],
) -> Result<(), SinkError> {
    let written = write_rows(&mut sink, shape, batch, results);
    let closed = sink.close();
    written.and(closed)
}

fn write_rows<S: OutputSink>(
    sink: &mut S,
    shape: ResultShape,
    batch: &QueryBatch,
    results: &[ExecutionResult],
) -> Result<(), SinkError> {
    sink.write_row(&shape.header(batch.tag_keys()))?;
    for result in results {
        sink.write_row(&shape.row(result))?;
    }
    Ok(())
}

/// Rows collected per artifact by [`MemorySinkFactory`]
pub type MemoryArtifacts = BTreeMap<String, Vec<Vec<String>>>;

/// In-memory sinks, for dry runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    artifacts: Arc<Mutex<MemoryArtifacts>>,
}

impl MemorySinkFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every closed artifact
    pub fn artifacts(&self) -> MemoryArtifacts {
        lock(&self.artifacts).clone()
    }
}

/// Sink produced by [`MemorySinkFactory`]; rows are published on close
#[derive(Debug)]
pub struct MemorySink {
    name: String,
    rows: Vec<Vec<String>>,
    artifacts: Arc<Mutex<MemoryArtifacts>>,
}

impl OutputSink for MemorySink {
    fn write_row(&mut self, row: &[String]) -> Result<(), SinkError> {
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        lock(&self.artifacts).insert(self.name, self.rows);
        Ok(())
    }
}

impl SinkFactory for MemorySinkFactory {
    type Sink = MemorySink;

    fn create(&self, artifact: &str) -> Result<MemorySink, SinkError> {
        if lock(&self.artifacts).contains_key(artifact) {
            return Err(SinkError::AlreadyExists {
                artifact: artifact.to_string(),
            });
        }
        Ok(MemorySink {
            name: artifact.to_string(),
            rows: Vec::new(),
            artifacts: Arc::clone(&self.artifacts),
        })
    }
}

fn lock(artifacts: &Mutex<MemoryArtifacts>) -> MutexGuard<'_, MemoryArtifacts> {
    artifacts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
