use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use logcli::alert::AlertEvaluator;
use logcli::cli::watch::evaluate_once;
use logcli::cli::EXIT_FATAL;
use logcli::config::{load_config, AlertType, ReadStart};
use logcli::source::{TailController, TailSettings, TickReport};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::time::Duration;
use tempfile::{Builder, TempDir};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
window_minutes: 5
poll_interval: 20ms
alerts:
  - name: high_errors
    type: error_rate
    threshold: 0.5
  - name: slow_requests
    type: p95_latency
    threshold: 500
"#;

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("watch.yml");
    fs::write(&path, yaml).unwrap();
    path
}

fn record(ts: chrono::DateTime<Utc>, severity: &str, latency: u32) -> String {
    format!(
        r#"{{"timestamp":"{}","service":"api","severity":"{}","message":"m","latency_ms":{}}}"#,
        ts.to_rfc3339(),
        severity,
        latency
    )
}

#[test]
fn test_load_config_from_disk() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&write_config(&dir, CONFIG)).unwrap();

    assert_eq!(config.window_minutes, 5);
    assert_eq!(config.poll_interval, Duration::from_millis(20));
    assert_eq!(config.max_missed_polls, 30);
    assert_eq!(config.alerts.len(), 2);
    assert_eq!(config.alerts[1].alert_type, AlertType::P95Latency);
}

#[test]
fn test_invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "window_minutes: 0\nalerts:\n  - name: a\n    type: error_rate\n    threshold: -1\n",
    );

    let err = load_config(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("window_minutes"));
    assert!(message.contains("threshold"));
    let cli_err: logcli::cli::CliError = err.into();
    assert_eq!(cli_err.exit_code(), EXIT_FATAL);
}

#[test]
fn test_once_fires_both_alerts() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&write_config(&dir, CONFIG)).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 12, 4, 10, 5, 0).unwrap();

    let mut file = Builder::new().suffix(".jsonl").tempfile().unwrap();
    for i in 0..4 {
        let ts = now - ChronoDuration::seconds(60 - i);
        writeln!(file, "{}", record(ts, "ERROR", 1000 + i as u32)).unwrap();
    }
    writeln!(file, "{}", record(now - ChronoDuration::seconds(10), "INFO", 5)).unwrap();
    // Outside the five minute window.
    writeln!(file, "{}", record(now - ChronoDuration::minutes(30), "INFO", 1)).unwrap();
    file.flush().unwrap();

    let report = evaluate_once(file.path(), &config, now).unwrap();
    assert_eq!(report.snapshot.total_count, 5);
    assert_eq!(report.snapshot.error_count, 4);
    assert_eq!(report.stale_records, 1);
    assert_eq!(report.snapshot.p95_latency_ms, Some(1003.0));

    let names: Vec<_> = report.alerts.iter().map(|a| a.rule_name.as_str()).collect();
    assert_eq!(names, vec!["high_errors", "slow_requests"]);
    assert!((report.alerts[0].computed_value - 0.8).abs() < 1e-12);
    assert_eq!(
        report.alerts[0].to_string(),
        "ALERT: [high_errors] error_rate 0.800 > 0.5"
    );
}

#[test]
fn test_once_on_empty_file_fires_nothing() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&write_config(&dir, CONFIG)).unwrap();
    let file = Builder::new().suffix(".jsonl").tempfile().unwrap();

    let report = evaluate_once(file.path(), &config, Utc::now()).unwrap();
    assert_eq!(report.snapshot.total_count, 0);
    assert!(report.snapshot.p95_latency_ms.is_none());
    assert!(report.alerts.is_empty());
}

#[test]
fn test_once_on_missing_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&write_config(&dir, CONFIG)).unwrap();

    let err = evaluate_once(&dir.path().join("absent.jsonl"), &config, Utc::now()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_FATAL);
}

#[tokio::test]
async fn test_follow_picks_up_appended_records() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&write_config(&dir, CONFIG)).unwrap();
    let log_path = dir.path().join("app.jsonl");
    fs::write(&log_path, record(Utc::now(), "ERROR", 1) + "\n").unwrap();

    let mut controller = TailController::new(
        log_path.clone(),
        TailSettings::from_config(&config, ReadStart::End),
        AlertEvaluator::from_config(&config),
    );
    controller.open().unwrap();

    let cancel = CancellationToken::new();
    let writer_cancel = cancel.clone();
    let writer_path = log_path.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(60)).await;
        let mut file = OpenOptions::new().append(true).open(&writer_path).unwrap();
        writeln!(file, "{}", record(Utc::now(), "INFO", 7)).unwrap();
        writeln!(file, "{}", record(Utc::now(), "ERROR", 9)).unwrap();
        sleep(Duration::from_millis(200)).await;
        writer_cancel.cancel();
    });

    let mut ticks: Vec<TickReport> = Vec::new();
    let mut sink = |report: &TickReport| ticks.push(report.clone());
    controller.run(cancel, &mut sink).await.unwrap();

    assert!(!ticks.is_empty());
    let last = ticks.last().unwrap();
    // The pre-existing line was skipped by starting at the end.
    assert_eq!(last.snapshot.total_count, 2);
    assert_eq!(last.snapshot.error_count, 1);
    assert!(ticks.iter().all(|t| t.alerts.is_empty()));
}
