use crate::source::record::{parse_counted, LogRecord, SkipStats};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension required for log files given to `analyze`.
pub const LOG_EXTENSION: &str = "jsonl";

/// Line that ends interactive stdin input.
pub const STDIN_EXIT_MARKER: &str = "Exit";

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("the file '{0}' was not found")]
    NotFound(PathBuf),

    #[error("'{0}' is not a regular file")]
    NotRegularFile(PathBuf),

    #[error("unsupported file type '{extension}' for '{path}' (expected .{expected})")]
    UnsupportedExtension {
        path: PathBuf,
        extension: String,
        expected: &'static str,
    },
}

/// Open a JSON Lines file for a one-shot read.
pub fn open_log_file(path: &Path) -> Result<BufReader<File>, ReaderError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    if extension != LOG_EXTENSION {
        return Err(ReaderError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension: if extension.is_empty() {
                "<none>".to_string()
            } else {
                format!(".{}", extension)
            },
            expected: LOG_EXTENSION,
        });
    }

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ReaderError::NotFound(path.to_path_buf()),
        _ => ReaderError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(ReaderError::NotRegularFile(path.to_path_buf()));
    }

    Ok(BufReader::new(File::open(path)?))
}

/// Reads validated records from any buffered source, counting skips.
pub struct RecordReader<R> {
    inner: R,
    line_number: u64,
    skips: SkipStats,
    exit_marker: Option<&'static str>,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_number: 0,
            skips: SkipStats::default(),
            exit_marker: None,
            done: false,
        }
    }

    /// Stop at the first line equal to `marker` (after trimming trailing whitespace).
    pub fn with_exit_marker(mut self, marker: &'static str) -> Self {
        self.exit_marker = Some(marker);
        self
    }

    /// Read the next valid record. `Ok(None)` at end of input.
    ///
    /// Malformed lines are counted and skipped; only I/O failures are errors.
    pub fn next_record(&mut self) -> Result<Option<LogRecord>, ReaderError> {
        let mut buf = Vec::new();
        while !self.done {
            buf.clear();
            let bytes_read = self.inner.read_until(b'\n', &mut buf)?;
            if bytes_read == 0 {
                self.done = true;
                break;
            }
            self.line_number += 1;

            let line = String::from_utf8_lossy(&buf);
            if let Some(marker) = self.exit_marker {
                if line.trim_end() == marker {
                    self.done = true;
                    break;
                }
            }

            if let Some(record) = parse_counted(&line, self.line_number, &mut self.skips) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    pub fn skips(&self) -> &SkipStats {
        &self.skips
    }

    pub fn lines_read(&self) -> u64 {
        self.line_number
    }

}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<LogRecord, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
