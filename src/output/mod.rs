use crate::metrics::{AnalysisReport, MetricSnapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn render_report(report: &AnalysisReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(report)),
        OutputFormat::Json => render_json(report),
    }
}

pub fn render_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn render_table(report: &AnalysisReport) -> String {
    let mut lines = vec![
        "Summary:".to_string(),
        format!("  Total records: {}", report.total),
        format!(
            "  Time range: {} -> {}",
            fmt_time(report.time_range.start),
            fmt_time(report.time_range.end)
        ),
        format!(
            "  Error rate: {:.3} ({} errors)",
            report.error_rate, report.error_count
        ),
    ];

    lines.push(String::new());
    lines.push("By severity:".to_string());
    lines.extend(count_lines(
        report
            .severity_counts
            .iter()
            .map(|(severity, count)| (severity.to_string(), *count)),
    ));

    lines.push(String::new());
    lines.push("By service:".to_string());
    lines.extend(count_lines(
        report
            .service_counts
            .iter()
            .map(|(service, count)| (service.clone(), *count)),
    ));

    let latency = &report.latency_ms;
    lines.push(String::new());
    lines.push("Latency (ms):".to_string());
    lines.push(format!("  count: {}", latency.count));
    lines.push(format!("  min: {}", fmt_opt(latency.min)));
    lines.push(format!("  max: {}", fmt_opt(latency.max)));
    lines.push(format!("  avg: {}", fmt_opt(latency.avg)));
    lines.push(format!("  p95: {}", fmt_opt(latency.p95)));

    let skipped = &report.skipped;
    lines.push(String::new());
    lines.push(format!("Skipped lines: {}", skipped.total));
    lines.push(format!("  invalid_json: {}", skipped.by_reason.invalid_json));
    lines.push(format!("  missing_field: {}", skipped.by_reason.missing_field));
    for (field, count) in &skipped.by_reason.missing_fields {
        lines.push(format!("    {}: {}", field, count));
    }
    lines.push(format!(
        "  invalid_timestamp: {}",
        skipped.by_reason.invalid_timestamp
    ));
    lines.push(format!(
        "  invalid_latency: {}",
        skipped.by_reason.invalid_latency
    ));

    lines.join("\n")
}

fn count_lines<I>(counts: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let lines: Vec<String> = counts
        .into_iter()
        .map(|(key, count)| format!("  {}: {}", key, count))
        .collect();
    if lines.is_empty() {
        vec!["  (none)".to_string()]
    } else {
        lines
    }
}

/// One-line summary of a watch tick.
pub fn render_snapshot_line(at: DateTime<Utc>, snapshot: &MetricSnapshot, skipped: u64) -> String {
    format!(
        "[{}] window: total={} errors={} error_rate={:.3} p95_ms={} skipped={}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        snapshot.total_count,
        snapshot.error_count,
        snapshot.error_rate,
        fmt_opt(snapshot.p95_latency_ms),
        skipped
    )
}

fn fmt_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v),
        Some(v) => format!("{:.3}", v),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::StatsAggregator;
    use crate::source::record::{LogRecord, Severity, SkipReason, SkipStats};
    use chrono::TimeZone;

    fn report() -> AnalysisReport {
        let mut agg = StatsAggregator::new();
        for (i, (severity, latency)) in [
            (Severity::Error, Some(10.0)),
            (Severity::Info, Some(20.5)),
            (Severity::Error, None),
        ]
        .into_iter()
        .enumerate()
        {
            agg.add(&LogRecord {
                timestamp: Utc.with_ymd_and_hms(2025, 12, 4, 10, 0, i as u32).unwrap(),
                service: "api".to_string(),
                severity,
                message: "m".to_string(),
                latency_ms: latency,
            });
        }
        let mut skips = SkipStats::default();
        skips.record(&SkipReason::MissingField("service"));
        agg.report(&skips)
    }

    #[test]
    fn test_table_contains_sections() {
        let table = render_table(&report());
        assert!(table.contains("Total records: 3"));
        assert!(table.contains("Time range: 2025-12-04T10:00:00Z -> 2025-12-04T10:00:02Z"));
        assert!(table.contains("Error rate: 0.667 (2 errors)"));
        assert!(table.contains("  ERROR: 2"));
        assert!(table.contains("  api: 3"));
        assert!(table.contains("  p95: 20.500"));
        assert!(table.contains("Skipped lines: 1"));
        assert!(table.contains("    service: 1"));
    }

    #[test]
    fn test_empty_table_layout() {
        let table = render_table(&StatsAggregator::new().report(&SkipStats::default()));
        assert!(table.starts_with("Summary:\n  Total records: 0\n  Time range: - -> -\n"));
        assert!(table.contains("\n\nBy severity:\n  (none)\n\nBy service:\n  (none)\n\n"));
        assert!(table.contains("Latency (ms):\n  count: 0\n  min: -\n"));
        assert!(table.ends_with("  invalid_timestamp: 0\n  invalid_latency: 0"));
    }

    #[test]
    fn test_json_shape() {
        let json = render_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["severity_counts"]["ERROR"], 2);
        assert_eq!(value["service_counts"]["api"], 3);
        assert_eq!(value["latency_ms"]["count"], 2);
        assert_eq!(value["latency_ms"]["p95"], 20.5);
        assert_eq!(value["skipped"]["total"], 1);
        assert_eq!(value["skipped"]["missing_field"], 1);
        assert_eq!(value["skipped"]["missing_fields"]["service"], 1);
        assert_eq!(value["time_range"]["start"], "2025-12-04T10:00:00Z");
    }

    #[test]
    fn test_empty_report_json_has_nulls() {
        let report = StatsAggregator::new().report(&SkipStats::default());
        let value: serde_json::Value =
            serde_json::from_str(&render_json(&report).unwrap()).unwrap();
        assert_eq!(value["error_rate"], 0.0);
        assert!(value["latency_ms"]["p95"].is_null());
        assert!(value["time_range"]["start"].is_null());
    }

    #[test]
    fn test_snapshot_line() {
        let at = Utc.with_ymd_and_hms(2025, 12, 4, 10, 0, 0).unwrap();
        let line = render_snapshot_line(at, &MetricSnapshot::new(4, 1, Some(99.0)), 2);
        assert_eq!(
            line,
            "[2025-12-04T10:00:00Z] window: total=4 errors=1 error_rate=0.250 p95_ms=99 skipped=2"
        );
    }
}
