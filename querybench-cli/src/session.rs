//! Engine Session
//!
//! Runs every planned engine at the same time, one thread per engine, each
//! with its own [`BenchmarkRunner`] and bounded pool. An engine that fails its
//! connectivity check is excluded without affecting the others, and an
//! aborted batch does not stop the engine's remaining batches.

use querybench_core::{
    BenchmarkRunner, EngineSpec, MemorySinkFactory, QueryBatch, QueryExecutor, SinkFactory,
};
use querybench_report::{EngineStatus, EngineSummary, summarize_batch};
use tracing::{error, warn};

/// Everything needed to run one engine
#[derive(Debug)]
pub struct EnginePlan<E> {
    /// Engine settings
    pub spec: EngineSpec,
    /// Client
    pub executor: E,
    /// Batches, in execution order
    pub batches: Vec<QueryBatch>,
}

/// Result of a connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Engine name
    pub engine: String,
    /// Failure message, `None` when the engine answered
    pub error: Option<String>,
}

/// Run all engines concurrently and summarize them, in plan order
pub fn run_engines<E, F>(
    plans: Vec<EnginePlan<E>>,
    sinks: &F,
    pool_size: usize,
    progress: bool,
) -> Vec<EngineSummary>
where
    E: QueryExecutor,
    F: SinkFactory + Clone,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = plans
            .into_iter()
            .map(|plan| {
                let name = plan.spec.name.clone();
                let sinks = sinks.clone();
                let handle = s.spawn(move || run_engine(plan, sinks, pool_size, progress));
                (name, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| {
                handle.join().unwrap_or_else(|_| {
                    EngineSummary::failed(
                        name,
                        EngineStatus::Aborted,
                        "engine thread panicked",
                        Vec::new(),
                    )
                })
            })
            .collect()
    })
}

fn run_engine<E: QueryExecutor, F: SinkFactory>(
    plan: EnginePlan<E>,
    sinks: F,
    pool_size: usize,
    progress: bool,
) -> EngineSummary {
    let name = plan.spec.name.clone();
    let mut runner =
        match BenchmarkRunner::new(plan.spec, plan.batches, plan.executor, sinks, pool_size) {
            Ok(runner) => runner.with_progress(progress),
            Err(e) => {
                error!("{}", e);
                return EngineSummary::failed(
                    name,
                    EngineStatus::Misconfigured,
                    e.to_string(),
                    Vec::new(),
                );
            }
        };

    if let Err(e) = runner.check_connection() {
        error!("{}", e);
        warn!(engine = %name, "Excluding engine from the run");
        return EngineSummary::failed(name, EngineStatus::CheckFailed, e.to_string(), Vec::new());
    }

    let outcomes = match runner.run_queries() {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!("{}", e);
            return EngineSummary::failed(name, EngineStatus::Aborted, e.to_string(), Vec::new());
        }
    };

    let mut batches = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(outcome) => batches.push(summarize_batch(&outcome)),
            Err(e) => errors.push(e.to_string()),
        }
    }

    if errors.is_empty() {
        EngineSummary::completed(name, batches)
    } else {
        EngineSummary::failed(name, EngineStatus::Aborted, errors.join("; "), batches)
    }
}

/// Check every engine concurrently without running any batch
pub fn check_engines<E: QueryExecutor>(plans: Vec<EnginePlan<E>>) -> Vec<CheckOutcome> {
    std::thread::scope(|s| {
        let handles: Vec<_> = plans
            .into_iter()
            .map(|plan| {
                let name = plan.spec.name.clone();
                (name, s.spawn(move || check_engine(plan)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(engine, handle)| {
                let error = handle
                    .join()
                    .unwrap_or_else(|_| Some("engine thread panicked".to_string()));
                CheckOutcome { engine, error }
            })
            .collect()
    })
}

fn check_engine<E: QueryExecutor>(plan: EnginePlan<E>) -> Option<String> {
    let runner = BenchmarkRunner::new(
        plan.spec,
        Vec::new(),
        plan.executor,
        MemorySinkFactory::new(),
        1,
    );
    let result = runner.and_then(|mut runner| runner.check_connection());
    match result {
        Ok(()) => None,
        Err(e) => {
            error!("{}", e);
            Some(e.to_string())
        }
    }
}
