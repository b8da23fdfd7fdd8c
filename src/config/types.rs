use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for `watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Width of the trailing alert window, in minutes.
    pub window_minutes: i64,
    #[serde(default = "default_poll_interval", with = "duration_format")]
    pub poll_interval: Duration,
    /// Consecutive failed polls tolerated before the watched path is
    /// considered permanently unavailable.
    #[serde(default = "default_max_missed_polls")]
    pub max_missed_polls: u32,
    pub alerts: Vec<AlertRuleConfig>,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_missed_polls() -> u32 {
    30
}

impl WatchConfig {
    /// The window as a duration, or `None` when it cannot be represented as
    /// an offset from a timestamp.
    pub fn checked_window(&self) -> Option<Duration> {
        let minutes = u64::try_from(self.window_minutes).ok()?;
        let window = Duration::from_secs(minutes.checked_mul(60)?);
        chrono::Duration::from_std(window).ok()?;
        Some(window)
    }

    /// Saturates instead of overflowing; validated configs always fit.
    pub fn window(&self) -> Duration {
        match self.checked_window() {
            Some(window) => window,
            None if self.window_minutes <= 0 => Duration::ZERO,
            None => Duration::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ErrorRate,
    #[serde(rename = "p95_latency")]
    P95Latency,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ErrorRate => "error_rate",
            AlertType::P95Latency => "p95_latency",
        }
    }
}

/// Where the tail controller starts reading on its first open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStart {
    Beginning,
    End,
}

// Custom serde module for duration parsing
mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else {
            return Err(format!("invalid duration format: {} (expected e.g. 500ms, 2s, 1m)", s));
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            _ => Duration::from_secs(
                value
                    .checked_mul(60)
                    .ok_or_else(|| format!("duration too large: {}", s))?,
            ),
        };

        Ok(duration)
    }

    fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

}
