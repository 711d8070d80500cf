//! Summary Statistics
//!
//! Summaries are computed over every sample given; failed attempts carry no
//! duration and are counted by the caller, not here.

use crate::percentiles::Percentiles;
use serde::{Deserialize, Serialize};

/// Latency summary of one query's successful attempts, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Number of samples
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median
    pub median: f64,
    /// Sample standard deviation (0 below two samples)
    pub std_dev: f64,
    /// Fastest sample
    pub min: f64,
    /// Slowest sample
    pub max: f64,
    /// Tail percentiles
    pub percentiles: Percentiles,
}

/// Compute a latency summary. All fields are 0 when there are no samples.
///
/// Percentiles interpolate linearly between nearest ranks.
///
/// ```
/// # use querybench_stats::compute_summary;
/// let summary = compute_summary(&[40.0, 10.0, 30.0, 20.0]);
/// assert_eq!(summary.median, 25.0);
/// assert_eq!(summary.max, 40.0);
/// ```
pub fn compute_summary(samples: &[f64]) -> LatencySummary {
    if samples.is_empty() {
        return LatencySummary::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std_dev = if count < 2 {
        0.0
    } else {
        let variance =
            sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    };

    let percentiles = Percentiles::of_sorted(&sorted);

    LatencySummary {
        count,
        mean,
        median: percentiles.p50,
        std_dev,
        min: sorted[0],
        max: sorted[count - 1],
        percentiles,
    }
}

impl LatencySummary {
    /// Coefficient of variation, in percent
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }
}
