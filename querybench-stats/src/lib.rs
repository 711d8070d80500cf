#![warn(missing_docs)]
//! QueryBench Statistics
//!
//! Summaries over the durations of successful attempts:
//! - Mean, median and sample standard deviation
//! - Extremes
//! - Tail percentiles (p90, p95, p99) by linear interpolation

mod percentiles;
mod summary;

pub use percentiles::Percentiles;
pub use summary::{LatencySummary, compute_summary};
