use super::rule::{AlertEvent, AlertRule};
use crate::config::types::WatchConfig;
use crate::metrics::MetricSnapshot;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Evaluates a fixed rule list against metric snapshots.
///
/// Rules are checked in declaration order and independently of one another.
/// There is no debouncing: a condition that stays true fires on every call.
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    rules: Vec<AlertRule>,
}

impl AlertEvaluator {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.alerts.iter().map(AlertRule::from_config).collect())
    }

    pub fn evaluate(&self, snapshot: &MetricSnapshot, now: DateTime<Utc>) -> Vec<AlertEvent> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let value = rule.check(snapshot);
                debug!(
                    rule = %rule.name,
                    value = ?rule.observed_value(snapshot),
                    threshold = rule.threshold,
                    fired = value.is_some(),
                    "Evaluated alert rule"
                );
                value.map(|computed_value| AlertEvent {
                    rule_name: rule.name.clone(),
                    alert_type: rule.alert_type,
                    computed_value,
                    threshold: rule.threshold,
                    timestamp_emitted: now,
                })
            })
            .collect()
    }
}
