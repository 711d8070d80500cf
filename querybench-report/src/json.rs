//! JSON Output

use crate::report::RunSummary;

/// Generate a prettified JSON summary
pub fn generate_json_report(summary: &RunSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
