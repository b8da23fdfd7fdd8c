use crate::config::types::{AlertRuleConfig, AlertType};
use crate::metrics::MetricSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// An immutable threshold rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub name: String,
    pub alert_type: AlertType,
    pub threshold: f64,
}

impl AlertRule {
    pub fn new(name: impl Into<String>, alert_type: AlertType, threshold: f64) -> Self {
        Self {
            name: name.into(),
            alert_type,
            threshold,
        }
    }

    pub fn from_config(config: &AlertRuleConfig) -> Self {
        Self::new(config.name.clone(), config.alert_type, config.threshold)
    }

    /// The metric this rule watches, if the snapshot has one.
    ///
    /// An absent p95 means the rule cannot fire; it is never read as zero.
    pub fn observed_value(&self, snapshot: &MetricSnapshot) -> Option<f64> {
        match self.alert_type {
            AlertType::ErrorRate => Some(snapshot.error_rate),
            AlertType::P95Latency => snapshot.p95_latency_ms,
        }
    }

    /// Returns the value that crossed the threshold, if it did.
    pub fn check(&self, snapshot: &MetricSnapshot) -> Option<f64> {
        self.observed_value(snapshot)
            .filter(|value| *value > self.threshold)
    }
}

/// Emitted each time a rule's condition holds on a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub rule_name: String,
    pub alert_type: AlertType,
    pub computed_value: f64,
    pub threshold: f64,
    pub timestamp_emitted: DateTime<Utc>,
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ALERT: [{}] {} {:.3} > {}",
            self.rule_name,
            self.alert_type.as_str(),
            self.computed_value,
            self.threshold
        )
    }
}
