use super::CliError;
use crate::config::expand_tilde;
use crate::filter::WindowSpec;
use crate::metrics::{AnalysisReport, StatsAggregator};
use crate::output::{render_report, OutputFormat};
use crate::source::reader::{open_log_file, RecordReader, STDIN_EXIT_MARKER};
use crate::source::record::{parse_timestamp, Severity};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Log file to read; stdin when absent.
    pub path: Option<PathBuf>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub severities: Vec<String>,
    pub services: Vec<String>,
    pub output: OutputFormat,
}

impl AnalyzeOptions {
    pub fn window_spec(&self) -> Result<WindowSpec, CliError> {
        Ok(WindowSpec::all()
            .with_since(parse_flag("since", self.since.as_deref())?)
            .with_until(parse_flag("until", self.until.as_deref())?)
            .with_services(self.services.iter().cloned())
            .with_severities(self.severities.iter().map(|s| Severity::normalize(s))))
    }
}

fn parse_flag(
    flag: &'static str,
    value: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, CliError> {
    value
        .map(|v| {
            parse_timestamp(v).ok_or_else(|| CliError::InvalidTimestamp {
                flag,
                value: v.to_string(),
            })
        })
        .transpose()
}

/// Aggregate every record from `reader` that falls inside `window`.
pub fn analyze_records<R: BufRead>(
    mut reader: RecordReader<R>,
    window: &WindowSpec,
) -> Result<AnalysisReport, CliError> {
    let mut aggregator = StatsAggregator::new();
    while let Some(record) = reader.next_record()? {
        if window.matches(&record) {
            aggregator.add(&record);
        }
    }

    let skips = reader.skips();
    info!(
        lines = reader.lines_read(),
        skipped = skips.total(),
        "Finished reading input"
    );
    Ok(aggregator.report(skips))
}

pub fn analyze(options: &AnalyzeOptions) -> Result<AnalysisReport, CliError> {
    let window = options.window_spec()?;

    match &options.path {
        Some(path) => {
            let path = expand_tilde(path);
            info!(path = %path.display(), "Analyzing log file");
            analyze_records(RecordReader::new(open_log_file(&path)?), &window)
        }
        None => {
            info!("Analyzing logs from stdin");
            let stdin = io::stdin();
            let reader = RecordReader::new(stdin.lock()).with_exit_marker(STDIN_EXIT_MARKER);
            analyze_records(reader, &window)
        }
    }
}

/// Run `analyze` and write the rendered report to `out`.
pub fn run<W: Write>(options: &AnalyzeOptions, out: &mut W) -> Result<(), CliError> {
    let report = analyze(options)?;
    let rendered = render_report(&report, options.output)?;
    writeln!(out, "{}", rendered)?;
    Ok(())
}
