mod app;
mod config;
mod sessions;
mod watch;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use refleks_logging::{EventLog, LogFormat};

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(
    name = "refleks",
    about = "Watch aim-trainer session logs and correlate them with motion traces",
    version,
    author
)]
struct Cli {
    /// Settings file (default: ~/.refleks/refleks.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Stats directory to read session logs from
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Directory for persisted motion traces
    #[arg(long, global = true)]
    traces_dir: Option<PathBuf>,

    /// Tracing filter level (RUST_LOG wins)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also write tracing output to this file as JSON lines
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the stats directory and announce new sessions until Ctrl+C
    Watch(WatchArgs),

    /// Parse a single session log
    Parse {
        /// Session log file
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse the newest session logs in the stats directory
    List {
        /// Newest files to include (0 = all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the persisted trace for a session log file name
    Trace {
        file_name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Poll interval, e.g. "5s" or "1500ms"
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,

    /// Parse at most this many existing files on start
    #[arg(long)]
    limit: Option<usize>,

    /// Do not parse files that already exist on start
    #[arg(long)]
    no_parse_existing: bool,

    /// Enable the motion sample buffer
    #[arg(long)]
    mouse_tracking: bool,

    /// Also append announcements to this file as JSON lines
    #[arg(long)]
    events_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let _guard = refleks_logging::init_tracing(&cli.log_level, log_format, cli.log_file.as_deref());

    let mut overrides = Overrides {
        stats_dir: cli.path.clone(),
        traces_dir: cli.traces_dir.clone(),
        ..Overrides::default()
    };

    match cli.command {
        Commands::Watch(args) => {
            overrides.poll_interval = args.poll_interval;
            overrides.max_existing_on_start = args.limit;
            overrides.no_parse_existing = args.no_parse_existing;
            overrides.mouse_tracking = args.mouse_tracking;

            let log = match args.events_file {
                Some(ref path) => EventLog::with_file(log_format, path)?,
                None => EventLog::new(log_format),
            };
            watch::run(cli.config, overrides, log).await
        }
        Commands::Parse { file, json } => {
            let settings = overrides.load(cli.config.as_deref())?;
            sessions::handle_parse(&settings, &file, json)
        }
        Commands::List { limit, json } => {
            let settings = overrides.load(cli.config.as_deref())?;
            sessions::handle_list(&settings, limit, json)
        }
        Commands::Trace { file_name, json } => {
            let settings = overrides.load(cli.config.as_deref())?;
            sessions::handle_trace(&settings, &file_name, json)
        }
    }
}
