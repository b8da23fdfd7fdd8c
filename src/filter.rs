use crate::source::record::{LogRecord, Severity};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;

/// Time/service/severity selection applied to records.
///
/// `since` is inclusive and `until` exclusive. Empty `services` or
/// `severities` sets select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSpec {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub services: BTreeSet<String>,
    pub severities: BTreeSet<Severity>,
}

impl WindowSpec {
    /// A window that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// The trailing window used by watch mode: `[now - window, ∞)`.
    pub fn trailing(now: DateTime<Utc>, window: Duration) -> Self {
        Self::all().with_since(Some(trailing_cutoff(now, window)))
    }

    pub fn with_since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    pub fn with_until(mut self, until: Option<DateTime<Utc>>) -> Self {
        self.until = until;
        self
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_severities<I>(mut self, severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        self.severities = severities.into_iter().collect();
        self
    }

    /// Whether `record` falls inside this selection.
    pub fn matches(&self, record: &LogRecord) -> bool {
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp >= until {
                return false;
            }
        }
        if !self.services.is_empty() && !self.services.contains(&record.service) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&record.severity) {
            return false;
        }
        true
    }

    /// Keep only the records that match, preserving order.
    pub fn filter<'a, I>(&'a self, records: I) -> impl Iterator<Item = LogRecord> + 'a
    where
        I: IntoIterator<Item = LogRecord>,
        I::IntoIter: 'a,
    {
        records.into_iter().filter(move |r| self.matches(r))
    }
}

/// `now - window`, saturating at the earliest representable instant.
pub fn trailing_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
