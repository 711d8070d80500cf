//! Run Planner
//!
//! Selects engines and batches for an invocation:
//! - `--engine` restricts the engines (all configured engines otherwise)
//! - the positional regex is matched against batch descriptions
//!
//! Engines are ordered by name; batches keep their file order.

use querybench_core::QueryBatch;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::warn;

/// Engines to run and their batches
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    /// Batches per engine, ordered by engine name
    pub engines: BTreeMap<String, Vec<QueryBatch>>,
}

impl ExecutionPlan {
    /// Number of selected batches
    pub fn batch_count(&self) -> usize {
        self.engines.values().map(Vec::len).sum()
    }
}

/// Engines to ingest for: the requested ones that are configured, or all
/// configured engines when none is requested.
pub fn select_engines<'a>(
    configured: impl IntoIterator<Item = &'a String>,
    requested: &[String],
) -> Vec<String> {
    let configured: Vec<String> = configured.into_iter().cloned().collect();
    if requested.is_empty() {
        return configured;
    }
    for name in requested {
        if !configured.contains(name) {
            warn!(engine = %name, "Engine is not configured, ignoring");
        }
    }
    configured
        .into_iter()
        .filter(|name| requested.contains(name))
        .collect()
}

/// Build the plan from ingested batches
pub fn build_plan(
    batches: BTreeMap<String, Vec<QueryBatch>>,
    filter: Option<&Regex>,
) -> ExecutionPlan {
    let engines = batches
        .into_iter()
        .map(|(engine, batches)| {
            let selected = batches
                .into_iter()
                .filter(|b| filter.is_none_or(|re| re.is_match(b.description())))
                .collect();
            (engine, selected)
        })
        .collect();

    ExecutionPlan { engines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querybench_core::QueryRecord;

    fn batch(engine: &str, description: &str) -> QueryBatch {
        let record = QueryRecord::new("q1", engine, description, "SELECT 1", 1);
        QueryBatch::new(engine, description, Vec::new(), vec![record]).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_all_engines_by_default() {
        let configured = names(&["hive", "presto"]);
        assert_eq!(select_engines(&configured, &[]), configured);
    }

    #[test]
    fn test_select_requested_engines() {
        let configured = names(&["hive", "impala", "presto"]);
        let selected = select_engines(&configured, &names(&["presto", "oracle", "hive"]));
        assert_eq!(selected, ["hive", "presto"]);
    }

    #[test]
    fn test_filter_on_description() {
        let mut batches = BTreeMap::new();
        batches.insert(
            "hive".to_string(),
            vec![batch("hive", "tpch-q1"), batch("hive", "smoke"), batch("hive", "tpch-q2")],
        );
        batches.insert("presto".to_string(), vec![batch("presto", "smoke")]);

        let re = Regex::new("^tpch").unwrap();
        let plan = build_plan(batches, Some(&re));

        let hive: Vec<_> = plan.engines["hive"].iter().map(|b| b.description()).collect();
        assert_eq!(hive, ["tpch-q1", "tpch-q2"]);
        assert!(plan.engines["presto"].is_empty());
        assert_eq!(plan.batch_count(), 2);
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let mut batches = BTreeMap::new();
        batches.insert("hive".to_string(), vec![batch("hive", "a"), batch("hive", "b")]);
        assert_eq!(build_plan(batches, None).batch_count(), 2);
    }
}
