#![warn(missing_docs)]
//! QueryBench Report - Artifacts and Summaries
//!
//! - Pipe-delimited artifact files, one per batch, in an output directory
//! - Per-query, per-batch and per-run summaries
//! - JSON and human-readable summary output

mod file;
mod human;
mod json;
mod report;

pub use file::{ARTIFACT_DELIMITER, DelimitedFileSink, DirectorySinkFactory};
pub use human::format_human_output;
pub use json::generate_json_report;
pub use report::{
    BatchSummary, EngineStatus, EngineSummary, QuerySummary, RunSummary, summarize_batch,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Human));
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
