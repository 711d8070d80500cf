//! Percentile Computation

use serde::{Deserialize, Serialize};

/// Standard percentiles reported per query
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

/// Percentile of already-sorted samples; `sorted` must not be empty
pub(crate) fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> f64 {
    let n = sorted.len();
    let p = (percentile / 100.0).clamp(0.0, 1.0);

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = (lower_idx + 1).min(n - 1);
    let fraction = rank - lower_idx as f64;

    sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
}

impl Percentiles {
    /// Standard percentiles of already-sorted samples; `sorted` must not be empty
    pub(crate) fn of_sorted(sorted: &[f64]) -> Self {
        Self {
            p50: percentile_of_sorted(sorted, 50.0),
            p90: percentile_of_sorted(sorted, 90.0),
            p95: percentile_of_sorted(sorted, 95.0),
            p99: percentile_of_sorted(sorted, 99.0),
        }
    }
}
