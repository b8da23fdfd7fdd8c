use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Fields every record must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 4] = ["timestamp", "service", "severity", "message"];

/// Normalized severity vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Debug,
    Unknown,
}

impl Severity {
    /// Case-insensitive mapping onto the fixed vocabulary. Anything outside it
    /// becomes `Unknown`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Severity::Error,
            "WARN" | "WARNING" => Severity::Warn,
            "INFO" => Severity::Info,
            "DEBUG" => Severity::Debug,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub severity: Severity,
    pub message: String,
    pub latency_ms: Option<f64>,
}

impl LogRecord {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Why a line did not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InvalidJson,
    MissingField(&'static str),
    InvalidTimestamp,
    InvalidLatency,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidJson => f.write_str("invalid_json"),
            SkipReason::MissingField(name) => write!(f, "missing_field:{}", name),
            SkipReason::InvalidTimestamp => f.write_str("invalid_timestamp"),
            SkipReason::InvalidLatency => f.write_str("invalid_latency"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Record(LogRecord),
    Skip(SkipReason),
}

/// Parse one line of JSON Lines input.
///
/// Every input maps to either a record or a skip reason; malformed input never
/// produces an error value or a panic.
pub fn parse_line(line: &str) -> ParseOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Skip(SkipReason::InvalidJson);
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return ParseOutcome::Skip(SkipReason::InvalidJson),
    };

    let Value::Object(obj) = value else {
        return ParseOutcome::Skip(SkipReason::InvalidJson);
    };

    match validate_object(&obj) {
        Ok(record) => ParseOutcome::Record(record),
        Err(reason) => ParseOutcome::Skip(reason),
    }
}

fn validate_object(obj: &Map<String, Value>) -> Result<LogRecord, SkipReason> {
    let timestamp_raw = required_str(obj, "timestamp")?;
    let service = required_str(obj, "service")?;
    let severity_raw = required_str(obj, "severity")?;
    let message = required_str(obj, "message")?;

    let timestamp = parse_timestamp(timestamp_raw).ok_or(SkipReason::InvalidTimestamp)?;

    let latency_ms = match obj.get("latency_ms") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() && v >= 0.0 => Some(v),
            _ => return Err(SkipReason::InvalidLatency),
        },
        Some(_) => return Err(SkipReason::InvalidLatency),
    };

    Ok(LogRecord {
        timestamp,
        service: service.to_string(),
        severity: Severity::normalize(severity_raw),
        message: message.to_string(),
        latency_ms,
    })
}

// A present field of the wrong JSON type counts as missing.
fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SkipReason> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        _ => Err(SkipReason::MissingField(field)),
    }
}

/// Parse an ISO 8601 timestamp and normalize it to UTC.
///
/// Accepts RFC 3339 (fractional seconds, `Z` or `+hh:mm`), compact offsets
/// (`+hhmm`), and offset-less forms which are taken to be UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Per-run skip counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipStats {
    pub invalid_json: u64,
    pub missing_field: u64,
    pub invalid_timestamp: u64,
    pub invalid_latency: u64,
    /// Breakdown of `missing_field` by field name.
    pub missing_fields: BTreeMap<String, u64>,
}

impl SkipStats {
    pub fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::InvalidJson => self.invalid_json += 1,
            SkipReason::MissingField(name) => {
                self.missing_field += 1;
                *self.missing_fields.entry(name.to_string()).or_insert(0) += 1;
            }
            SkipReason::InvalidTimestamp => self.invalid_timestamp += 1,
            SkipReason::InvalidLatency => self.invalid_latency += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.invalid_json + self.missing_field + self.invalid_timestamp + self.invalid_latency
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn merge(&mut self, other: &SkipStats) {
        self.invalid_json += other.invalid_json;
        self.missing_field += other.missing_field;
        self.invalid_timestamp += other.invalid_timestamp;
        self.invalid_latency += other.invalid_latency;
        for (field, count) in &other.missing_fields {
            *self.missing_fields.entry(field.clone()).or_insert(0) += count;
        }
    }
}

/// Parse a line and fold any skip into `skips`.
///
/// Blank lines are dropped without being counted.
pub fn parse_counted(line: &str, line_number: u64, skips: &mut SkipStats) -> Option<LogRecord> {
    match parse_line(line) {
        ParseOutcome::Record(record) => Some(record),
        ParseOutcome::Skip(reason) => {
            if !line.trim().is_empty() {
                debug!(line = line_number, reason = %reason, "Skipping log line");
                skips.record(&reason);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn skip_reason(line: &str) -> SkipReason {
        match parse_line(line) {
            ParseOutcome::Skip(reason) => reason,
            ParseOutcome::Record(r) => panic!("expected skip, got record {:?}", r),
        }
    }

    fn record(line: &str) -> LogRecord {
        match parse_line(line) {
            ParseOutcome::Record(r) => r,
            ParseOutcome::Skip(reason) => panic!("expected record, got skip {}", reason),
        }
    }

    #[test]
    fn test_parse_valid_record() {
        let r = record(
            r#"{"timestamp":"2025-12-04T10:00:00.250Z","service":"api","severity":"error","message":"boom","latency_ms":42.5}"#,
        );
        assert_eq!(
            r.timestamp,
            Utc.with_ymd_and_hms(2025, 12, 4, 10, 0, 0).unwrap()
                + chrono::Duration::milliseconds(250)
        );
        assert_eq!(r.service, "api");
        assert_eq!(r.severity, Severity::Error);
        assert_eq!(r.message, "boom");
        assert_eq!(r.latency_ms, Some(42.5));
        assert!(r.is_error());
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        let r = record(
            r#"{"timestamp":"2025-12-04T12:00:00+02:00","service":"a","severity":"INFO","message":"m"}"#,
        );
        assert_eq!(r.timestamp, Utc.with_ymd_and_hms(2025, 12, 4, 10, 0, 0).unwrap());
        assert_eq!(r.latency_ms, None);
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        assert_eq!(
            parse_timestamp("2025-12-04T10:00:00"),
            Some(Utc.with_ymd_and_hms(2025, 12, 4, 10, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2025-12-04"),
            Some(Utc.with_ymd_and_hms(2025, 12, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2025-12-04T10:00:00+0100"),
            Some(Utc.with_ymd_and_hms(2025, 12, 4, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_blank_and_garbage_lines() {
        assert_eq!(skip_reason(""), SkipReason::InvalidJson);
        assert_eq!(skip_reason("   \t"), SkipReason::InvalidJson);
        assert_eq!(skip_reason("not json"), SkipReason::InvalidJson);
        assert_eq!(skip_reason("[1,2,3]"), SkipReason::InvalidJson);
        assert_eq!(skip_reason(r#"{"timestamp": "#), SkipReason::InvalidJson);
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        assert_eq!(
            skip_reason(r#"{"service":"a","severity":"INFO","message":"m"}"#),
            SkipReason::MissingField("timestamp")
        );
        assert_eq!(
            skip_reason(r#"{"timestamp":"2025-12-04T10:00:00Z","severity":"INFO","message":"m"}"#),
            SkipReason::MissingField("service")
        );
        assert_eq!(
            skip_reason(r#"{"timestamp":"2025-12-04T10:00:00Z","service":"a","severity":3,"message":"m"}"#),
            SkipReason::MissingField("severity")
        );
        assert_eq!(
            skip_reason(r#"{"timestamp":"2025-12-04T10:00:00Z","service":"a","severity":"INFO","message":null}"#),
            SkipReason::MissingField("message")
        );
    }

    #[test]
    fn test_invalid_timestamp() {
        assert_eq!(
            skip_reason(r#"{"timestamp":"yesterday","service":"a","severity":"INFO","message":"m"}"#),
            SkipReason::InvalidTimestamp
        );
    }

    #[test]
    fn test_latency_validation() {
        let base = r#""timestamp":"2025-12-04T10:00:00Z","service":"a","severity":"INFO","message":"m""#;
        assert_eq!(
            skip_reason(&format!("{{{},\"latency_ms\":-1}}", base)),
            SkipReason::InvalidLatency
        );
        assert_eq!(
            skip_reason(&format!("{{{},\"latency_ms\":\"12\"}}", base)),
            SkipReason::InvalidLatency
        );
        assert_eq!(record(&format!("{{{},\"latency_ms\":null}}", base)).latency_ms, None);
        assert_eq!(record(&format!("{{{},\"latency_ms\":0}}", base)).latency_ms, Some(0.0));
    }

    #[test]
    fn test_unknown_fields_ignored_and_severity_normalized() {
        let r = record(
            r#"{"timestamp":"2025-12-04T10:00:00Z","service":"a","severity":"Warning","message":"m","trace_id":"x","extra":{"k":1}}"#,
        );
        assert_eq!(r.severity, Severity::Warn);

        let r = record(
            r#"{"timestamp":"2025-12-04T10:00:00Z","service":"a","severity":"fatal","message":"m"}"#,
        );
        assert_eq!(r.severity, Severity::Unknown);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::InvalidJson.to_string(), "invalid_json");
        assert_eq!(
            SkipReason::MissingField("service").to_string(),
            "missing_field:service"
        );
        assert_eq!(SkipReason::InvalidTimestamp.to_string(), "invalid_timestamp");
        assert_eq!(SkipReason::InvalidLatency.to_string(), "invalid_latency");
    }

    #[test]
    fn test_parse_counted_ignores_blank_lines() {
        let mut skips = SkipStats::default();
        assert!(parse_counted("", 1, &mut skips).is_none());
        assert!(parse_counted("{oops", 2, &mut skips).is_none());
        assert!(parse_counted(r#"{"service":"a"}"#, 3, &mut skips).is_none());

        assert_eq!(skips.invalid_json, 1);
        assert_eq!(skips.missing_field, 1);
        assert_eq!(skips.missing_fields.get("timestamp"), Some(&1));
        assert_eq!(skips.total(), 2);
    }
}
