use super::percentile::LatencySamples;
use super::MetricSnapshot;
use crate::source::record::LogRecord;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct WindowEntry {
    is_error: bool,
    latency_ms: Option<f64>,
}

/// Working set for watch mode.
///
/// Entries are ordered by record timestamp (ties broken by arrival) so aged
/// records are popped from the front. Counts and the latency multiset are
/// updated on every insert and eviction, which keeps each snapshot exact
/// without rescanning the window.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    entries: BTreeMap<(DateTime<Utc>, u64), WindowEntry>,
    next_seq: u64,
    errors: u64,
    latencies: LatencySamples,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: &LogRecord) {
        let entry = WindowEntry {
            is_error: record.is_error(),
            latency_ms: record.latency_ms,
        };
        if entry.is_error {
            self.errors += 1;
        }
        if let Some(latency) = entry.latency_ms {
            self.latencies.insert(latency);
        }
        self.entries.insert((record.timestamp, self.next_seq), entry);
        self.next_seq += 1;
    }

    /// Drop every entry with `timestamp < cutoff`. Returns how many were dropped.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        while let Some(((timestamp, _), _)) = self.entries.first_key_value() {
            if *timestamp >= cutoff {
                break;
            }
            let Some((_, entry)) = self.entries.pop_first() else {
                break;
            };
            if entry.is_error {
                self.errors -= 1;
            }
            if let Some(latency) = entry.latency_ms {
                self.latencies.remove(latency);
            }
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.errors = 0;
        self.latencies.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.keys().next().map(|(ts, _)| *ts)
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot::new(self.entries.len() as u64, self.errors, self.latencies.p95())
    }
}
