//! Human Output
//!
//! Terminal summary: one section per engine, one block per batch, one line
//! per query with its success count and latency percentiles.

use crate::report::{EngineStatus, RunSummary};

/// Format a run summary for terminal display
pub fn format_human_output(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("QueryBench Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for engine in &summary.engines {
        let status_icon = match engine.status {
            EngineStatus::Completed => "✓",
            EngineStatus::CheckFailed => "✗",
            EngineStatus::Aborted => "💥",
            EngineStatus::Misconfigured => "⊘",
        };
        output.push_str(&format!("{} Engine: {}\n", status_icon, engine.engine));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        if let Some(error) = &engine.error {
            output.push_str(&format!("  error: {}\n", error));
        }

        for batch in &engine.batches {
            output.push_str(&format!(
                "  {}  ({} ok / {} failed)  -> {}\n",
                batch.description, batch.successes, batch.failures, batch.artifact
            ));

            let width = batch
                .queries
                .iter()
                .map(|q| q.id.len())
                .max()
                .unwrap_or(8)
                .max(8);

            for query in &batch.queries {
                if query.successes == 0 {
                    output.push_str(&format!(
                        "    {:<width$}  0/{}  {}\n",
                        query.id,
                        query.attempts,
                        query.last_error.as_deref().unwrap_or("failed"),
                        width = width
                    ));
                    continue;
                }
                let latency = &query.latency_ms;
                output.push_str(&format!(
                    "    {:<width$}  {}/{}  mean: {:.2} ms  p50: {:.2} ms  p95: {:.2} ms  max: {:.2} ms  cv: {:.1}%\n",
                    query.id,
                    query.successes,
                    query.attempts,
                    latency.mean,
                    latency.percentiles.p50,
                    latency.percentiles.p95,
                    latency.max,
                    latency.coefficient_of_variation(),
                    width = width
                ));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    let elapsed = summary.finished_at - summary.started_at;
    output.push_str(&format!(
        "Summary: {} engines, {} attempts, {} failed, {:.2}s\n",
        summary.engines.len(),
        summary.total_attempts(),
        summary.total_failures(),
        elapsed.num_milliseconds() as f64 / 1000.0
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{BatchSummary, EngineSummary, QuerySummary};
    use chrono::Local;
    use querybench_stats::compute_summary;

    #[test]
    fn test_human_output_lists_queries() {
        let batch = BatchSummary {
            engine: "hive".to_string(),
            description: "smoke".to_string(),
            artifact: "hive-smoke-20240301-090507.000.csv".to_string(),
            attempts: 3,
            successes: 2,
            failures: 1,
            queries: vec![
                QuerySummary {
                    id: "q1".to_string(),
                    attempts: 2,
                    successes: 2,
                    failures: 0,
                    latency_ms: compute_summary(&[10.0, 20.0]),
                    last_error: None,
                },
                QuerySummary {
                    id: "q2".to_string(),
                    attempts: 1,
                    successes: 0,
                    failures: 1,
                    latency_ms: compute_summary(&[]),
                    last_error: Some("no such table".to_string()),
                },
            ],
        };
        let now = Local::now();
        let summary = RunSummary {
            started_at: now,
            finished_at: now,
            engines: vec![
                EngineSummary::completed("hive", vec![batch]),
                EngineSummary::failed(
                    "impala",
                    EngineStatus::CheckFailed,
                    "connection refused",
                    Vec::new(),
                ),
            ],
        };

        let text = format_human_output(&summary);

        assert!(text.contains("✓ Engine: hive"));
        assert!(text.contains("mean: 15.00 ms"));
        // std dev 7.07 over mean 15
        assert!(text.contains("cv: 47.1%"));
        assert!(text.contains("0/1  no such table"));
        assert!(text.contains("✗ Engine: impala"));
        assert!(text.contains("error: connection refused"));
        assert!(text.contains("Summary: 2 engines, 3 attempts, 1 failed"));
    }
}
