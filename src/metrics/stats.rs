use super::percentile::LatencySamples;
use super::MetricSnapshot;
use crate::source::record::{LogRecord, Severity, SkipStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Batch aggregator for one-shot analysis.
///
/// Tracks the snapshot inputs (total, errors, latency samples) together with
/// per-severity and per-service counts, the observed time range, and latency
/// min/max/avg. Maps are ordered so rendered output is stable across runs.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    total: u64,
    errors: u64,
    by_severity: BTreeMap<Severity, u64>,
    by_service: BTreeMap<String, u64>,
    latencies: LatencySamples,
    latency_sum: f64,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &LogRecord) {
        self.total += 1;
        if record.is_error() {
            self.errors += 1;
        }
        *self.by_severity.entry(record.severity).or_insert(0) += 1;
        *self.by_service.entry(record.service.clone()).or_insert(0) += 1;

        self.start = Some(match self.start {
            Some(start) => start.min(record.timestamp),
            None => record.timestamp,
        });
        self.end = Some(match self.end {
            Some(end) => end.max(record.timestamp),
            None => record.timestamp,
        });

        if let Some(latency) = record.latency_ms {
            self.latencies.insert(latency);
            self.latency_sum += latency;
        }
    }

    pub fn consume<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        for record in records {
            self.add(record);
        }
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot::new(self.total, self.errors, self.latencies.p95())
    }

    pub fn report(&self, skips: &SkipStats) -> AnalysisReport {
        let snapshot = self.snapshot();
        let count = self.latencies.len();
        AnalysisReport {
            total: self.total,
            error_count: self.errors,
            error_rate: snapshot.error_rate,
            time_range: TimeRange {
                start: self.start,
                end: self.end,
            },
            severity_counts: self.by_severity.clone(),
            service_counts: self.by_service.clone(),
            latency_ms: LatencySummary {
                count,
                min: self.latencies.min(),
                max: self.latencies.max(),
                avg: if count == 0 {
                    None
                } else {
                    Some(self.latency_sum / count as f64)
                },
                p95: snapshot.p95_latency_ms,
            },
            skipped: SkippedSummary {
                total: skips.total(),
                by_reason: skips.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub total: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub time_range: TimeRange,
    pub severity_counts: BTreeMap<Severity, u64>,
    pub service_counts: BTreeMap<String, u64>,
    pub latency_ms: LatencySummary,
    pub skipped: SkippedSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub p95: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSummary {
    pub total: u64,
    #[serde(flatten)]
    pub by_reason: SkipStats,
}
