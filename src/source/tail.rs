use crate::alert::{AlertEvaluator, AlertEvent};
use crate::config::types::{ReadStart, WatchConfig};
use crate::filter::{trailing_cutoff, WindowSpec};
use crate::metrics::{MetricSnapshot, SlidingWindow};
use crate::source::line_buffer::{LineBuffer, MAX_PENDING_LINE_BYTES};
use crate::source::record::{parse_counted, SkipReason, SkipStats};
use chrono::{DateTime, Utc};
use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum TailError {
    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{0}' is not a regular file")]
    NotRegularFile(PathBuf),

    #[error("'{path}' has been unavailable for {polls} consecutive polls")]
    Unavailable { path: PathBuf, polls: u32 },

    #[error("tail controller for '{0}' has already failed")]
    Halted(PathBuf),
}

/// Named states of the tail controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPhase {
    Opening,
    Polling,
    Reading,
    Reopening,
    Fatal,
}

/// Identity of the file behind a path (device + inode on unix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        }
    }

    // Without inodes, fall back to the creation time; size and mtime change on
    // every append so they cannot identify the file.
    #[cfg(not(unix))]
    pub fn of(metadata: &Metadata) -> Self {
        let created = metadata
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            device: 0,
            inode: created,
        }
    }
}

/// In-memory tailing position. Never persisted.
#[derive(Debug, Default)]
pub struct TailState {
    pub file_identity: Option<FileIdentity>,
    pub byte_offset: u64,
    pub partial_line_buffer: LineBuffer,
}

impl TailState {
    fn reset(&mut self) {
        self.file_identity = None;
        self.byte_offset = 0;
        self.partial_line_buffer.clear();
    }
}

#[derive(Debug, Clone)]
pub struct TailSettings {
    pub poll_interval: Duration,
    pub window: Duration,
    pub max_missed_polls: u32,
    /// Start position for the first open only; reopens always start at 0.
    pub start: ReadStart,
}

impl TailSettings {
    pub fn from_config(config: &WatchConfig, start: ReadStart) -> Self {
        Self {
            poll_interval: config.poll_interval,
            window: config.window(),
            max_missed_polls: config.max_missed_polls,
            start,
        }
    }
}

/// Outcome of one read-evaluate cycle.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub snapshot: MetricSnapshot,
    pub alerts: Vec<AlertEvent>,
    /// Records added to the window this tick.
    pub new_records: usize,
    /// Records parsed this tick but already older than the window.
    pub stale_records: usize,
    pub evicted: usize,
    pub skipped: SkipStats,
    /// The file was truncated or replaced and the window restarted empty.
    pub reopened: bool,
}

/// Receives every tick produced by [`TailController::run`].
pub trait TickSink {
    fn on_tick(&mut self, report: &TickReport);
}

impl<F> TickSink for F
where
    F: FnMut(&TickReport),
{
    fn on_tick(&mut self, report: &TickReport) {
        self(report)
    }
}

#[derive(Debug, Default)]
struct TickProgress {
    new_records: usize,
    stale_records: usize,
    skipped: SkipStats,
    reopened: bool,
}

enum PollIssue {
    Transient(TailError),
    Fatal(TailError),
}

impl From<TailError> for PollIssue {
    fn from(err: TailError) -> Self {
        match err {
            TailError::Io { .. } => PollIssue::Transient(err),
            other => PollIssue::Fatal(other),
        }
    }
}

/// Follows one growing file and drives parse → window → alerts per tick.
///
/// Transitions: `Opening → Polling ⇄ Reading → Polling`, with `Reopening`
/// whenever the file identity changes or the file shrinks below the current
/// offset, and `Fatal` when the path is not a regular file or stays
/// unavailable for `max_missed_polls` consecutive polls.
pub struct TailController {
    path: PathBuf,
    settings: TailSettings,
    evaluator: AlertEvaluator,
    state: TailState,
    phase: TailPhase,
    file: Option<File>,
    window: SlidingWindow,
    opened_once: bool,
    missed_polls: u32,
    lines_seen: u64,
    total_skips: SkipStats,
}

impl TailController {
    pub fn new(path: PathBuf, settings: TailSettings, evaluator: AlertEvaluator) -> Self {
        Self {
            path,
            settings,
            evaluator,
            state: TailState::default(),
            phase: TailPhase::Opening,
            file: None,
            window: SlidingWindow::new(),
            opened_once: false,
            missed_polls: 0,
            lines_seen: 0,
            total_skips: SkipStats::default(),
        }
    }

    pub fn phase(&self) -> TailPhase {
        self.phase
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Skips accumulated over the controller's lifetime.
    pub fn total_skips(&self) -> &SkipStats {
        &self.total_skips
    }

    /// Open the file and record its identity and starting offset.
    ///
    /// The first open honours `settings.start`; content before that point is
    /// never replayed. Later opens (after rotation or truncation) start at 0.
    pub fn open(&mut self) -> Result<(), TailError> {
        self.phase = TailPhase::Opening;

        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let metadata = file.metadata().map_err(|e| self.io_error(e))?;
        if !metadata.is_file() {
            self.phase = TailPhase::Fatal;
            return Err(TailError::NotRegularFile(self.path.clone()));
        }

        let start_offset = if self.opened_once {
            0
        } else {
            match self.settings.start {
                ReadStart::Beginning => 0,
                ReadStart::End => metadata.len(),
            }
        };

        self.state.file_identity = Some(FileIdentity::of(&metadata));
        self.state.byte_offset = start_offset;
        self.state.partial_line_buffer.clear();
        self.file = Some(file);
        self.opened_once = true;
        self.phase = TailPhase::Polling;

        info!(
            path = %self.path.display(),
            offset = start_offset,
            "Opened watched file"
        );
        Ok(())
    }

    /// One read-evaluate cycle at time `now`.
    ///
    /// Transient failures are logged and leave the window untouched; alerts are
    /// still evaluated so the window keeps ageing.
    pub fn poll_once(&mut self, now: DateTime<Utc>) -> Result<TickReport, TailError> {
        if self.phase == TailPhase::Fatal {
            return Err(TailError::Halted(self.path.clone()));
        }

        let mut progress = TickProgress::default();
        match self.refresh(now, &mut progress) {
            Ok(()) => self.missed_polls = 0,
            Err(PollIssue::Fatal(err)) => {
                self.phase = TailPhase::Fatal;
                error!(path = %self.path.display(), error = %err, "Tailing failed");
                return Err(err);
            }
            Err(PollIssue::Transient(err)) => {
                self.missed_polls += 1;
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    missed_polls = self.missed_polls,
                    "Watched file unavailable, retrying next tick"
                );
                if self.missed_polls >= self.settings.max_missed_polls {
                    self.phase = TailPhase::Fatal;
                    return Err(TailError::Unavailable {
                        path: self.path.clone(),
                        polls: self.missed_polls,
                    });
                }
            }
        }

        let evicted = self
            .window
            .evict_before(trailing_cutoff(now, self.settings.window));
        let snapshot = self.window.snapshot();
        let alerts = self.evaluator.evaluate(&snapshot, now);

        self.total_skips.merge(&progress.skipped);
        self.phase = TailPhase::Polling;

        debug!(
            new_records = progress.new_records,
            evicted,
            total = snapshot.total_count,
            errors = snapshot.error_count,
            p95 = ?snapshot.p95_latency_ms,
            alerts = alerts.len(),
            "Tick complete"
        );

        Ok(TickReport {
            at: now,
            snapshot,
            alerts,
            new_records: progress.new_records,
            stale_records: progress.stale_records,
            evicted,
            skipped: progress.skipped,
            reopened: progress.reopened,
        })
    }

    /// Poll on a fixed interval until `cancel` fires or a fatal error occurs.
    ///
    /// Cancellation only interrupts the sleep between ticks, never a read.
    pub async fn run<S: TickSink>(
        &mut self,
        cancel: CancellationToken,
        sink: &mut S,
    ) -> Result<(), TailError> {
        if self.file.is_none() {
            self.open()?;
        }

        info!(
            path = %self.path.display(),
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            window_secs = self.settings.window.as_secs(),
            "Watching file"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(path = %self.path.display(), "Stop requested, leaving watch loop");
                    return Ok(());
                }
                _ = sleep(self.settings.poll_interval) => {}
            }

            let report = self.poll_once(Utc::now())?;
            sink.on_tick(&report);
        }
    }

    fn refresh(&mut self, now: DateTime<Utc>, progress: &mut TickProgress) -> Result<(), PollIssue> {
        if self.file.is_none() {
            self.open()?;
        }

        let metadata = std::fs::metadata(&self.path).map_err(|e| self.io_error(e))?;
        if !metadata.is_file() {
            return Err(PollIssue::Fatal(TailError::NotRegularFile(self.path.clone())));
        }

        let identity = FileIdentity::of(&metadata);
        let rotated = self.state.file_identity != Some(identity);
        let truncated = metadata.len() < self.state.byte_offset;
        if rotated || truncated {
            self.reopen(rotated, metadata.len());
            progress.reopened = true;
            self.open()?;
        }

        self.read_appended(now, progress)
            .map_err(|e| PollIssue::Transient(self.io_error(e)))
    }

    fn reopen(&mut self, rotated: bool, new_len: u64) {
        self.phase = TailPhase::Reopening;
        info!(
            path = %self.path.display(),
            rotated,
            old_offset = self.state.byte_offset,
            new_len,
            dropped = self.window.len(),
            "Watched file replaced or truncated, restarting window"
        );
        self.file = None;
        self.state.reset();
        self.window.clear();
    }

    fn read_appended(&mut self, now: DateTime<Utc>, progress: &mut TickProgress) -> io::Result<()> {
        self.phase = TailPhase::Reading;

        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let len = file.metadata()?.len();
        if len <= self.state.byte_offset {
            return Ok(());
        }

        file.seek(SeekFrom::Start(self.state.byte_offset))?;
        let mut chunk = Vec::with_capacity((len - self.state.byte_offset) as usize);
        Read::by_ref(file)
            .take(len - self.state.byte_offset)
            .read_to_end(&mut chunk)?;

        self.state.byte_offset += chunk.len() as u64;
        self.state.partial_line_buffer.push(&chunk);

        let spec = WindowSpec::trailing(now, self.settings.window);
        for line in self.state.partial_line_buffer.drain_complete_lines() {
            self.lines_seen += 1;
            let Some(record) = parse_counted(&line, self.lines_seen, &mut progress.skipped) else {
                continue;
            };
            if spec.matches(&record) {
                self.window.insert(&record);
                progress.new_records += 1;
            } else {
                progress.stale_records += 1;
            }
        }

        let dropped = self.state.partial_line_buffer.take_dropped();
        if dropped > 0 {
            warn!(
                path = %self.path.display(),
                max_bytes = MAX_PENDING_LINE_BYTES,
                "Dropping oversized partial line"
            );
            for _ in 0..dropped {
                progress.skipped.record(&SkipReason::InvalidJson);
            }
        }

        Ok(())
    }

    fn io_error(&self, source: io::Error) -> TailError {
        TailError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
