//! CLI argument parsing for percore

use clap::{Parser, ValueEnum};

use crate::aggregator::ReportMode;

/// Output format for sampling reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable columns (default)
    Text,
    /// JSON document for machine parsing
    Json,
    /// CSV for spreadsheet analysis
    Csv,
}

/// How per-core values are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Column N is the load of core N
    Index,
    /// Columns are the busiest cores, highest first
    Busiest,
}

impl From<ModeArg> for ReportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Index => ReportMode::Index,
            ModeArg::Busiest => ReportMode::Busiest,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "percore")]
#[command(version)]
#[command(about = "Sample per-core CPU utilization of a program's threads", long_about = None)]
pub struct Cli {
    /// Seconds between samples
    #[arg(
        short = 't',
        long = "time",
        value_name = "SECONDS",
        default_value = "1",
        allow_negative_numbers = true
    )]
    pub cadence: f64,

    /// Number of cores to aggregate over (defaults to the online core count)
    #[arg(long = "cores", value_name = "N")]
    pub cores: Option<usize>,

    /// Number of busiest cores to report (defaults to the affinity mask size)
    #[arg(short = 'n', long = "top", value_name = "N")]
    pub top: Option<usize>,

    /// Core column layout
    #[arg(long = "mode", value_enum, default_value = "index")]
    pub mode: ModeArg,

    /// Show per-thread utilization and core for every sample
    #[arg(short, long)]
    pub verbose: bool,

    /// Label for the run (defaults to the program name)
    #[arg(short, long, value_name = "LABEL")]
    pub label: Option<String>,

    /// Do not print column headers
    #[arg(long = "no-header")]
    pub no_header: bool,

    /// Do not print per-sample lines
    #[arg(long = "no-steps")]
    pub no_steps: bool,

    /// Do not print the run summary
    #[arg(long = "no-summary")]
    pub no_summary: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to FILE instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<std::path::PathBuf>,

    /// Measure the sampler's own overhead
    #[arg(long = "profile-self")]
    pub profile_self: bool,

    /// Enable trace-level logging on stderr
    #[arg(long)]
    pub debug: bool,

    /// Command to run and monitor (everything after --)
    #[arg(last = true)]
    pub command: Option<Vec<String>>,
}
