use super::{CliError, EXIT_ALERTS_FIRED};
use crate::alert::AlertEvaluator;
use crate::config::{expand_tilde, load_config, ReadStart, WatchConfig};
use crate::output::render_snapshot_line;
use crate::source::tail::{TailController, TailSettings, TickReport, TickSink};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub path: PathBuf,
    pub config: PathBuf,
    /// Evaluate the whole file once instead of following it.
    pub once: bool,
}

/// Writes tick summaries to `out` and alert events to `alerts`.
///
/// Summaries are only printed when the window changed; alerts are printed on
/// every tick they fire.
pub struct ConsoleSink<O, E> {
    out: O,
    alerts: E,
}

impl<O: Write, E: Write> ConsoleSink<O, E> {
    pub fn new(out: O, alerts: E) -> Self {
        Self { out, alerts }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.alerts)
    }

    fn write_tick(&mut self, report: &TickReport) -> io::Result<()> {
        if report.new_records > 0 || report.evicted > 0 || report.reopened {
            writeln!(
                self.out,
                "{}",
                render_snapshot_line(report.at, &report.snapshot, report.skipped.total())
            )?;
        }
        for alert in &report.alerts {
            writeln!(self.alerts, "{}", alert)?;
        }
        self.alerts.flush()
    }
}

impl<O: Write, E: Write> TickSink for ConsoleSink<O, E> {
    fn on_tick(&mut self, report: &TickReport) {
        if let Err(e) = self.write_tick(report) {
            warn!(error = %e, "Failed to write tick output");
        }
    }
}

fn load(options: &WatchOptions) -> Result<(PathBuf, WatchConfig), CliError> {
    let config_path = expand_tilde(&options.config);
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(&config_path)?;
    info!(
        window_minutes = config.window_minutes,
        alerts = config.alerts.len(),
        "Configuration loaded"
    );
    Ok((expand_tilde(&options.path), config))
}

/// Read `path` from the start and evaluate the alert rules once at `now`.
pub fn evaluate_once(
    path: &Path,
    config: &WatchConfig,
    now: DateTime<Utc>,
) -> Result<TickReport, CliError> {
    let settings = TailSettings::from_config(config, ReadStart::Beginning);
    let mut controller =
        TailController::new(path.to_path_buf(), settings, AlertEvaluator::from_config(config));
    controller.open()?;
    Ok(controller.poll_once(now)?)
}

/// Run `watch`, returning the process exit code on success.
pub async fn run(options: &WatchOptions) -> Result<i32, CliError> {
    let (path, config) = load(options)?;

    if options.once {
        let report = evaluate_once(&path, &config, Utc::now())?;
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        writeln!(
            stdout,
            "{}",
            render_snapshot_line(report.at, &report.snapshot, report.skipped.total())
        )?;
        if report.alerts.is_empty() {
            writeln!(stderr, "OK")?;
            return Ok(0);
        }
        for alert in &report.alerts {
            writeln!(stderr, "{}", alert)?;
        }
        return Ok(EXIT_ALERTS_FIRED);
    }

    let settings = TailSettings::from_config(&config, ReadStart::End);
    let mut controller = TailController::new(path, settings, AlertEvaluator::from_config(&config));
    controller.open()?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_cancel.cancel();
        }
    });

    let mut sink = ConsoleSink::new(io::stdout(), io::stderr());
    controller.run(cancel, &mut sink).await?;

    let skips = controller.total_skips();
    info!(
        skipped = skips.total(),
        invalid_json = skips.invalid_json,
        missing_field = skips.missing_field,
        invalid_timestamp = skips.invalid_timestamp,
        invalid_latency = skips.invalid_latency,
        "Watch stopped"
    );
    Ok(0)
}
