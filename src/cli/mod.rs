pub mod analyze;
pub mod watch;

use thiserror::Error;

/// Exit code when a `watch --once` evaluation fired at least one alert.
pub const EXIT_ALERTS_FIRED: i32 = 1;
/// Exit code for missing inputs, invalid config, or a lost watched file.
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("{0}")]
    Reader(#[from] crate::source::ReaderError),

    #[error("{0}")]
    Tail(#[from] crate::source::TailError),

    #[error("invalid --{flag} timestamp '{value}'")]
    InvalidTimestamp { flag: &'static str, value: String },

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::Reader(_)
            | CliError::Tail(_)
            | CliError::InvalidTimestamp { .. } => EXIT_FATAL,
            CliError::Render(_) | CliError::Io(_) => 1,
        }
    }
}
