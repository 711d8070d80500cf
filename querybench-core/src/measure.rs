//! Attempt Timing
//!
//! Pairs a monotonic clock (for the duration) with wall-clock timestamps
//! (for the start/end columns of an artifact).

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Running stopwatch for one execution attempt
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    instant: Instant,
    started_at: DateTime<Local>,
}

/// Measurement captured when a [`Stopwatch`] stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Monotonic elapsed time
    pub duration: Duration,
    /// Wall-clock start
    pub started_at: DateTime<Local>,
    /// Wall-clock end
    pub finished_at: DateTime<Local>,
}

impl Stopwatch {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            instant: Instant::now(),
            started_at: Local::now(),
        }
    }

    /// Wall-clock start
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Stop and return the measurement
    pub fn stop(&self) -> Timing {
        let duration = self.instant.elapsed();
        Timing {
            duration,
            started_at: self.started_at,
            finished_at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch_measures_duration() {
        let watch = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(10));
        let timing = watch.stop();

        assert!(timing.duration >= Duration::from_millis(5));
        assert!(timing.finished_at >= timing.started_at);
    }
}
