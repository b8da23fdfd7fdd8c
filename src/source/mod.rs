pub mod line_buffer;
pub mod reader;
pub mod record;
pub mod tail;

pub use reader::{open_log_file, ReaderError, RecordReader};
pub use record::{parse_line, LogRecord, ParseOutcome, Severity, SkipReason, SkipStats};
pub use tail::{TailController, TailError, TailPhase, TailSettings, TickReport, TickSink};
