//! CLI interface for ptrial.
//!
//! Each subcommand is non-interactive: arguments in, lines out.
//!
//! - `ptrial observe <source>`: sample a source on an interval, one
//!   datapoint per line on stdout (or appended to `--out`).
//! - `ptrial context`: static facts about the host, as JSON.
//! - `ptrial pids <pattern>`: find a pid to observe.
//!
//! Diagnostics go to stderr so stdout can be piped.

mod observe;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::context::{HardwareContext, OsContext};
use crate::model::{DataFormat, TimeFormat};
use crate::procs;

/// ptrial: sample system metrics at a fixed interval.
#[derive(Debug, Parser)]
#[command(name = "ptrial", version, after_long_help = USAGE_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

const USAGE_HELP: &str = r#"Examples:
  ptrial observe cpu --interval 5 --count 12
  ptrial observe storage /var --data-format csv --out var.csv
  ptrial observe process $(ptrial pids sshd | head -1) --duration 60
  ptrial context

Defaults come from ~/.ptrial/config.toml when it exists."#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sample a metric source until the count is reached or time runs out.
    ///
    /// Datapoints are written one per line. In CSV mode a header line
    /// naming the columns is written first.
    Observe {
        #[command(subcommand)]
        source: ObserveSource,

        #[command(flatten)]
        args: ObserveArgs,
    },

    /// Print host context (hostname, kernel, CPU) as JSON.
    Context,

    /// Print pids whose command line contains a pattern, one per line.
    Pids {
        /// Substring to look for in `/proc/<pid>/cmdline`.
        pattern: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ObserveSource {
    /// Random values; useful for trying out formats.
    Test,

    /// Aggregate CPU time from `/proc/stat`.
    Cpu,

    /// Block I/O counters for the partition holding a directory.
    Storage {
        /// Any path on the partition to observe.
        path: PathBuf,
    },

    /// Scheduling and memory counters for one process.
    Process {
        /// Process id.
        pid: u32,
    },
}

impl ObserveSource {
    /// Observer name used when `--name` is not given.
    fn default_name(&self) -> String {
        match self {
            Self::Test => "test".to_string(),
            Self::Cpu => "cpu".to_string(),
            Self::Storage { path } => path.display().to_string(),
            Self::Process { pid } => format!("process {pid}"),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Test => "test source".to_string(),
            Self::Cpu => "CPU".to_string(),
            Self::Storage { path } => format!("storage for {}", path.display()),
            Self::Process { pid } => format!("process {pid}"),
        }
    }
}

/// Flags for `observe`. Unset flags fall back to the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ObserveArgs {
    /// Observer name carried in every datapoint.
    #[arg(long, global = true)]
    name: Option<String>,

    /// Seconds between samples (fractions allowed).
    #[arg(long, global = true)]
    interval: Option<f64>,

    /// Stop after this many samples; 0 runs until stopped.
    #[arg(long, global = true)]
    count: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long, global = true)]
    duration: Option<f64>,

    #[arg(long, global = true, value_enum)]
    data_format: Option<DataFormatArg>,

    #[arg(long, global = true, value_enum)]
    time_format: Option<TimeFormatArg>,

    /// Put the timestamp under "time" instead of using it as the key.
    #[arg(long, global = true)]
    time_as_value: bool,

    /// Datapoints that may wait unwritten before sampling blocks.
    #[arg(long, global = true)]
    queue_capacity: Option<usize>,

    /// Append datapoints to this file instead of writing to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,
}

impl ObserveArgs {
    /// Layer these flags over `config` and validate the result.
    fn apply(&self, config: &Config) -> Result<Config, String> {
        let mut merged = config.clone();
        if let Some(interval) = self.interval {
            merged.interval_secs = interval;
        }
        if let Some(count) = self.count {
            merged.count = count;
        }
        if let Some(capacity) = self.queue_capacity {
            merged.queue_capacity = capacity;
        }
        if let Some(format) = &self.data_format {
            merged.data_format = format.to_domain();
        }
        if let Some(format) = &self.time_format {
            merged.time_format = format.to_domain();
        }
        if self.time_as_value {
            merged.time_as_value = true;
        }
        merged.validate()?;
        Ok(merged)
    }

    fn duration(&self) -> Result<Option<Duration>, String> {
        self.duration
            .map(|secs| {
                if secs <= 0.0 {
                    return Err(format!("--duration must be positive, got {secs}"));
                }
                Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid --duration: {e}"))
            })
            .transpose()
    }
}

/// CLI-facing data format, mapped to the domain `DataFormat`.
#[derive(Debug, Clone, ValueEnum)]
pub enum DataFormatArg {
    /// Structured datapoints, written as JSON lines.
    Native,
    /// One JSON object per line.
    Json,
    /// Comma-separated values in field order, after a header line.
    Csv,
}

impl DataFormatArg {
    fn to_domain(&self) -> DataFormat {
        match self {
            Self::Native => DataFormat::Native,
            Self::Json => DataFormat::Json,
            Self::Csv => DataFormat::Csv,
        }
    }
}

/// CLI-facing time format, mapped to the domain `TimeFormat`.
#[derive(Debug, Clone, ValueEnum)]
pub enum TimeFormatArg {
    /// Seconds since the Unix epoch.
    Integer,
    /// Local `YYYY-MM-DD HH:MM:SS`; implies --time-as-value.
    Ascii,
}

impl TimeFormatArg {
    fn to_domain(&self) -> TimeFormat {
        match self {
            Self::Integer => TimeFormat::Integer,
            Self::Ascii => TimeFormat::Ascii,
        }
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config) -> Result<(), String> {
    execute(Cli::parse(), config)
}

fn execute(cli: Cli, config: &Config) -> Result<(), String> {
    match cli.command {
        Command::Observe { source, args } => {
            let merged = args.apply(config)?;
            observe::cmd_observe(&source, &args, &merged)
        }
        Command::Context => cmd_context(),
        Command::Pids { pattern } => cmd_pids(&pattern),
    }
}

fn cmd_context() -> Result<(), String> {
    let os = OsContext::read().map_err(|e| format!("failed to read OS context: {e}"))?;
    let hardware =
        HardwareContext::read().map_err(|e| format!("failed to read hardware context: {e}"))?;

    let json = serde_json::to_string_pretty(&serde_json::json!({
        "os": os,
        "hardware": hardware,
    }))
    .map_err(|e| format!("failed to serialize context: {e}"))?;

    println!("{json}");
    Ok(())
}

fn cmd_pids(pattern: &str) -> Result<(), String> {
    let pids = procs::pids_by_name(pattern).map_err(|e| format!("failed to scan processes: {e}"))?;

    for pid in pids {
        println!("{pid}");
    }
    Ok(())
}
