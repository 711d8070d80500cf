//! Run Summary Structures

use chrono::{DateTime, Local};
use querybench_core::{BatchOutcome, Status};
use querybench_stats::{LatencySummary, compute_summary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate of one query's attempts within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySummary {
    /// Query id
    pub id: String,
    /// Attempts made
    pub attempts: usize,
    /// Successful attempts
    pub successes: usize,
    /// Failed attempts
    pub failures: usize,
    /// Statistics over successful attempts, in milliseconds
    pub latency_ms: LatencySummary,
    /// Message of the last failed attempt
    pub last_error: Option<String>,
}

/// Aggregate of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Engine name
    pub engine: String,
    /// Batch description
    pub description: String,
    /// Artifact file name
    pub artifact: String,
    /// Attempts across all queries
    pub attempts: usize,
    /// Successful attempts
    pub successes: usize,
    /// Failed attempts
    pub failures: usize,
    /// Queries in input order
    pub queries: Vec<QuerySummary>,
}

/// How an engine's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Every batch produced an artifact
    Completed,
    /// The connectivity check failed, nothing ran
    CheckFailed,
    /// At least one batch was aborted by an infrastructure or output error
    Aborted,
    /// Configuration for this engine was unusable
    Misconfigured,
}

/// Per-engine part of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    /// Engine name
    pub engine: String,
    /// Final status
    pub status: EngineStatus,
    /// Why the engine did not complete
    pub error: Option<String>,
    /// Batches that produced an artifact
    pub batches: Vec<BatchSummary>,
}

impl EngineSummary {
    /// Summary of an engine whose batches all completed
    pub fn completed(engine: impl Into<String>, batches: Vec<BatchSummary>) -> Self {
        Self {
            engine: engine.into(),
            status: EngineStatus::Completed,
            error: None,
            batches,
        }
    }

    /// Summary of an engine that stopped with `error`
    pub fn failed(
        engine: impl Into<String>,
        status: EngineStatus,
        error: impl Into<String>,
        batches: Vec<BatchSummary>,
    ) -> Self {
        Self {
            engine: engine.into(),
            status,
            error: Some(error.into()),
            batches,
        }
    }
}

/// Everything one invocation did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started
    pub started_at: DateTime<Local>,
    /// When the last engine finished
    pub finished_at: DateTime<Local>,
    /// One entry per selected engine
    pub engines: Vec<EngineSummary>,
}

impl RunSummary {
    /// True when every engine completed
    pub fn is_success(&self) -> bool {
        self.engines
            .iter()
            .all(|e| e.status == EngineStatus::Completed)
    }

    /// Attempts across all engines
    pub fn total_attempts(&self) -> usize {
        self.batches().map(|b| b.attempts).sum()
    }

    /// Failed attempts across all engines
    pub fn total_failures(&self) -> usize {
        self.batches().map(|b| b.failures).sum()
    }

    fn batches(&self) -> impl Iterator<Item = &BatchSummary> {
        self.engines.iter().flat_map(|e| e.batches.iter())
    }
}

/// Summarize one executed batch, grouping attempts by query id
pub fn summarize_batch(outcome: &BatchOutcome) -> BatchSummary {
    struct Acc {
        id: String,
        durations: Vec<f64>,
        failures: usize,
        last_error: Option<String>,
    }

    let mut order: Vec<Acc> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for result in &outcome.results {
        let id = result.record().id();
        let slot = *index.entry(id).or_insert_with(|| {
            order.push(Acc {
                id: id.to_string(),
                durations: Vec::new(),
                failures: 0,
                last_error: None,
            });
            order.len() - 1
        });
        let acc = &mut order[slot];
        match result.status() {
            Status::Success => {
                if let Some(d) = result.duration() {
                    acc.durations.push(d.as_secs_f64() * 1000.0);
                }
            }
            Status::Fail => {
                acc.failures += 1;
                acc.last_error = result.error_message().map(str::to_string);
            }
        }
    }

    let queries: Vec<QuerySummary> = order
        .into_iter()
        .map(|acc| QuerySummary {
            attempts: acc.durations.len() + acc.failures,
            successes: acc.durations.len(),
            failures: acc.failures,
            latency_ms: compute_summary(&acc.durations),
            last_error: acc.last_error,
            id: acc.id,
        })
        .collect();

    BatchSummary {
        engine: outcome.engine.clone(),
        description: outcome.description.clone(),
        artifact: outcome.artifact.clone(),
        attempts: outcome.results.len(),
        successes: queries.iter().map(|q| q.successes).sum(),
        failures: queries.iter().map(|q| q.failures).sum(),
        queries,
    }
}
