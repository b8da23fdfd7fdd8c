use std::collections::BTreeMap;

/// Percentile reported by snapshots and alert rules.
pub const P95: f64 = 0.95;

/// Nearest-rank index of percentile `p` in a sorted set of `n` samples:
/// `ceil(p * n) - 1`, clamped to `[0, n - 1]`. `None` when `n == 0`.
pub fn nearest_rank_index(n: usize, p: f64) -> Option<usize> {
    if n == 0 {
        return None;
    }
    // The epsilon keeps products like 0.95 * 20 from rounding up past an integer.
    let rank = (p * n as f64 - 1e-9).ceil();
    let rank = if rank.is_finite() && rank > 0.0 { rank as usize } else { 1 };
    Some(rank.saturating_sub(1).min(n - 1))
}

/// Nearest-rank percentile over an unordered slice.
pub fn percentile_of(samples: &[f64], p: f64) -> Option<f64> {
    let index = nearest_rank_index(samples.len(), p)?;
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[index])
}

/// Exact multiset of non-negative latency samples.
///
/// Samples are keyed by their IEEE-754 bit pattern, which orders the same way
/// as the values themselves for non-negative finite floats. Insert and remove
/// are O(log d) in the number of distinct values; high percentiles walk from
/// the max end so p95 touches roughly 5% of the distinct keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencySamples {
    counts: BTreeMap<u64, u64>,
    len: usize,
}

fn key(value: f64) -> u64 {
    // -0.0 carries the sign bit; fold it onto +0.0.
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn value(key: u64) -> f64 {
    f64::from_bits(key)
}

impl LatencySamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample. Negative or non-finite values are ignored; the record
    /// parser never produces them.
    pub fn insert(&mut self, sample: f64) {
        if !sample.is_finite() || sample < 0.0 {
            return;
        }
        *self.counts.entry(key(sample)).or_insert(0) += 1;
        self.len += 1;
    }

    /// Remove one occurrence of `sample`. Returns false if it was not present.
    pub fn remove(&mut self, sample: f64) -> bool {
        let k = key(sample);
        match self.counts.get_mut(&k) {
            Some(count) if *count > 1 => {
                *count -= 1;
                self.len -= 1;
                true
            }
            Some(_) => {
                self.counts.remove(&k);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.len = 0;
    }

    pub fn min(&self) -> Option<f64> {
        self.counts.keys().next().map(|k| value(*k))
    }

    pub fn max(&self) -> Option<f64> {
        self.counts.keys().next_back().map(|k| value(*k))
    }

    /// Nearest-rank percentile `p` (0.0..=1.0) over the current samples.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let index = nearest_rank_index(self.len, p)?;

        if index >= self.len / 2 {
            let mut remaining = (self.len - 1 - index) as u64;
            for (k, count) in self.counts.iter().rev() {
                if remaining < *count {
                    return Some(value(*k));
                }
                remaining -= count;
            }
        } else {
            let mut remaining = index as u64;
            for (k, count) in &self.counts {
                if remaining < *count {
                    return Some(value(*k));
                }
                remaining -= count;
            }
        }

        None
    }

    pub fn p95(&self) -> Option<f64> {
        self.percentile(P95)
    }
}
