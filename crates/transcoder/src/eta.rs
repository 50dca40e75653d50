//! ETA estimation from the wall-clock time of earlier transcodes in this run.
//!
//! Per-item ETA uses the mean of the current file's duration bucket. Queue ETA
//! picks a bucket from the mean duration of the most recent transcodes and falls
//! back to the global mean when that bucket has no samples yet.

use crate::candidate::duration_bucket_secs;
use std::collections::BTreeMap;
use std::time::Duration;

/// Samples required before any estimate is shown.
pub const MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    duration_secs: f64,
    elapsed_secs: f64,
}

/// Moving averages of transcode time, bucketed by source duration.
#[derive(Debug, Clone)]
pub struct EtaEstimator {
    buckets: BTreeMap<u32, Vec<f64>>,
    history: Vec<Observation>,
    recent_window: usize,
}

impl EtaEstimator {
    pub fn new(recent_window: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            history: Vec::new(),
            recent_window: recent_window.max(1),
        }
    }

    /// Record a finished transcode of a source lasting `duration_secs`.
    pub fn record(&mut self, duration_secs: f64, elapsed: Duration) {
        let elapsed_secs = elapsed.as_secs_f64();
        self.buckets
            .entry(duration_bucket_secs(duration_secs))
            .or_default()
            .push(elapsed_secs);
        self.history.push(Observation {
            duration_secs,
            elapsed_secs,
        });
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    pub fn bucket_sample_count(&self, bucket: u32) -> usize {
        self.buckets.get(&bucket).map_or(0, Vec::len)
    }

    /// Expected time for one file in `bucket`; needs two samples in that bucket.
    pub fn item_eta(&self, bucket: u32) -> Option<Duration> {
        let samples = self.buckets.get(&bucket)?;
        if samples.len() < MIN_SAMPLES {
            return None;
        }
        Some(Duration::from_secs_f64(mean(samples)))
    }

    /// Expected time for `remaining` files; needs two samples overall.
    pub fn queue_eta(&self, remaining: usize) -> Option<Duration> {
        if self.history.len() < MIN_SAMPLES {
            return None;
        }

        let start = self.history.len().saturating_sub(self.recent_window);
        let recent: Vec<f64> = self.history[start..]
            .iter()
            .map(|o| o.duration_secs)
            .collect();
        let bucket = duration_bucket_secs(mean(&recent));

        let per_item = match self.buckets.get(&bucket) {
            Some(samples) if !samples.is_empty() => mean(samples),
            _ => {
                let all: Vec<f64> = self.history.iter().map(|o| o.elapsed_secs).collect();
                mean(&all)
            }
        };

        Some(Duration::from_secs_f64(per_item * remaining as f64))
    }
}

impl Default for EtaEstimator {
    fn default() -> Self {
        Self::new(5)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Whole days/hours/minutes, leading zero units omitted, minutes always shown.
///
/// `format_eta(Duration::from_secs(3725))` is `"1h 2min"`.
pub fn format_eta(eta: Duration) -> String {
    let total_minutes = (eta.as_secs_f64() / 60.0).round() as u64;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h {}min", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}min", hours, minutes)
    } else {
        format!("{}min", minutes)
    }
}
