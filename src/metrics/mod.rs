pub mod percentile;
pub mod stats;
pub mod window;

pub use percentile::{nearest_rank_index, percentile_of, LatencySamples, P95};
pub use stats::{AnalysisReport, LatencySummary, SkippedSummary, StatsAggregator, TimeRange};
pub use window::SlidingWindow;

use serde::Serialize;

/// Point-in-time statistics over the records currently in a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub total_count: u64,
    pub error_count: u64,
    /// `error_count / total_count`, or exactly 0 for an empty window.
    pub error_rate: f64,
    /// Absent when the window holds no latency samples.
    pub p95_latency_ms: Option<f64>,
}

impl MetricSnapshot {
    pub fn new(total_count: u64, error_count: u64, p95_latency_ms: Option<f64>) -> Self {
        let error_rate = if total_count == 0 {
            0.0
        } else {
            error_count as f64 / total_count as f64
        };
        Self {
            total_count,
            error_count,
            error_rate,
            p95_latency_ms,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, None)
    }
}
