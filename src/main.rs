use clap::{Parser, Subcommand};
use logcli::cli::analyze::AnalyzeOptions;
use logcli::cli::watch::WatchOptions;
use logcli::cli::CliError;
use logcli::output::OutputFormat;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logcli")]
#[command(about = "Analyze and watch JSON-lines log files", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a log file (or stdin) once
    Analyze {
        /// Path to a .jsonl file; reads stdin until an `Exit` line when omitted
        path: Option<PathBuf>,

        /// Only include records at or after this timestamp
        #[arg(long)]
        since: Option<String>,

        /// Only include records before this timestamp
        #[arg(long)]
        until: Option<String>,

        /// Only include these severities
        #[arg(long, num_args = 1..)]
        severity: Vec<String>,

        /// Only include these services
        #[arg(long, num_args = 1..)]
        service: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Follow a log file and evaluate alert rules over a sliding window
    Watch {
        path: PathBuf,

        /// Path to the watch configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Evaluate the whole file once and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "logcli=debug"
    } else {
        "logcli=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match dispatch(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn dispatch(command: Commands) -> Result<i32, CliError> {
    match command {
        Commands::Analyze {
            path,
            since,
            until,
            severity,
            service,
            output,
        } => {
            let options = AnalyzeOptions {
                path,
                since,
                until,
                severities: severity,
                services: service,
                output,
            };
            logcli::cli::analyze::run(&options, &mut io::stdout())?;
            Ok(0)
        }
        Commands::Watch { path, config, once } => {
            logcli::cli::watch::run(&WatchOptions { path, config, once }).await
        }
    }
}
