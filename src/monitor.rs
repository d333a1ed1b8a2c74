//! Monitoring session: launch a program and sample it until it exits
//!
//! Ties the [`Sampler`] to a [`Reporter`] and runs both under the
//! [`SampleScheduler`]. Configuration is validated once, up front, against
//! the system facts gathered by [`SystemInfo::query`].

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::accounting::{AccountingSource, ProcFs};
use crate::aggregator::ReportMode;
use crate::cli::{Cli, OutputFormat};
use crate::clock::SystemInfo;
use crate::error::SampleError;
use crate::profiling::ProfilingCategory;
use crate::reporter::{create_reporter, ReportOptions, Reporter, RunHeader};
use crate::sampler::{Sampler, SamplerSettings};
use crate::scheduler::{CycleStatus, CycleWork, RunOutcome, SampleScheduler, SystemClock};
use crate::summary::RunSummary;

/// Validated, immutable configuration of one monitoring run
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub cadence: Duration,
    pub core_count: usize,
    pub top_n: Option<usize>,
    pub mode: ReportMode,
    pub label: String,
    pub format: OutputFormat,
    pub report: ReportOptions,
    pub output: Option<PathBuf>,
    pub profile_self: bool,
    pub system: SystemInfo,
}

impl MonitorConfig {
    pub fn from_cli(cli: &Cli, system: SystemInfo) -> Result<Self> {
        let cadence = match Duration::try_from_secs_f64(cli.cadence) {
            Ok(cadence) if !cadence.is_zero() => cadence,
            _ => anyhow::bail!(
                "Invalid value for --time: {} (must be a positive number of seconds)",
                cli.cadence
            ),
        };

        let core_count = match cli.cores {
            Some(n) if n != system.online_cores => anyhow::bail!(
                "Invalid value for --cores: {} (the system reports {} online cores)",
                n,
                system.online_cores
            ),
            Some(n) => n,
            None => system.online_cores,
        };

        let top_n = cli.top.unwrap_or(system.affinity_cores);
        if top_n == 0 {
            anyhow::bail!("Invalid value for --top: 0 (must be >= 1)");
        }

        let label = cli
            .label
            .clone()
            .or_else(|| {
                cli.command
                    .as_ref()
                    .and_then(|c| c.first())
                    .map(|program| program_name(program))
            })
            .unwrap_or_else(|| "percore".to_string());

        Ok(Self {
            cadence,
            core_count,
            top_n: Some(top_n.min(core_count)),
            mode: cli.mode.into(),
            label,
            format: cli.format,
            report: ReportOptions {
                verbose: cli.verbose,
                header: !cli.no_header,
                steps: !cli.no_steps,
                summary: !cli.no_summary,
            },
            output: cli.output.clone(),
            profile_self: cli.profile_self,
            system,
        })
    }

    pub fn settings(&self) -> SamplerSettings {
        SamplerSettings {
            cadence: self.cadence,
            core_count: self.core_count,
            mode: self.mode,
            top_n: self.top_n,
        }
    }

    /// Entries in every reported vector
    pub fn columns(&self) -> usize {
        match self.mode {
            ReportMode::Index => self.core_count,
            ReportMode::Busiest => self.top_n.unwrap_or(self.core_count).min(self.core_count),
        }
    }

    pub fn header(&self, pid: u32) -> RunHeader {
        RunHeader {
            label: self.label.clone(),
            pid,
            cadence_secs: self.cadence.as_secs_f64(),
            mode: self.mode,
            columns: self.columns(),
        }
    }
}

fn program_name(program: &str) -> String {
    std::path::Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

/// One sampler feeding one reporter
pub struct Monitor<S: AccountingSource> {
    sampler: Sampler<S>,
    reporter: Box<dyn Reporter>,
    summary: RunSummary,
}

impl<S: AccountingSource> Monitor<S> {
    pub fn new(sampler: Sampler<S>, reporter: Box<dyn Reporter>, label: &str) -> Self {
        Self {
            sampler,
            reporter,
            summary: RunSummary::new(label),
        }
    }

    pub fn begin(&mut self, header: &RunHeader) -> crate::error::Result<()> {
        self.reporter.begin(header)?;
        Ok(())
    }

    /// Emit the summary and hand back the run totals
    pub fn finish(mut self, outcome: &RunOutcome) -> crate::error::Result<RunSummary> {
        self.summary.set_wall_secs(outcome.elapsed.as_secs());
        self.reporter.finish(&self.summary)?;
        if let Some(ctx) = self.sampler.profiling() {
            ctx.print_summary();
        }
        Ok(self.summary)
    }

    fn sample_and_report(&mut self, cycle: u64) -> crate::error::Result<CycleStatus> {
        let Some(report) = self.sampler.run_cycle(cycle)? else {
            return Ok(CycleStatus::ProcessGone);
        };
        let started = Instant::now();
        self.summary.record(&report);
        self.reporter.report_cycle(&report)?;
        self.sampler.profile(ProfilingCategory::Reporting, started.elapsed());
        Ok(CycleStatus::Continue)
    }
}

impl<S: AccountingSource> CycleWork for Monitor<S> {
    fn sample(&mut self, cycle: u64) -> crate::error::Result<CycleStatus> {
        self.sample_and_report(cycle)
    }

    fn drain(&mut self, cycle: u64) -> crate::error::Result<()> {
        self.sample_and_report(cycle).map(|_| ())
    }
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    })
}

fn run_session(
    child: &mut Child,
    reporter: Box<dyn Reporter>,
    config: &MonitorConfig,
) -> std::result::Result<RunSummary, SampleError> {
    let pid = child.id();
    let source = ProcFs::new(config.system.page_size);
    let sampler = Sampler::new(source, pid, config.system.tick, config.settings())?
        .with_profiling(config.profile_self);
    let mut monitor = Monitor::new(sampler, reporter, &config.label);
    monitor.begin(&config.header(pid))?;

    let mut scheduler = SampleScheduler::new(config.cadence, SystemClock::new())?;
    let outcome = scheduler.run(child, &mut monitor)?;
    monitor.finish(&outcome)
}

/// Run `command`, sample it until it exits and return its exit code
pub fn monitor_command(command: &[String], config: MonitorConfig) -> Result<i32> {
    if command.is_empty() {
        anyhow::bail!("Command array is empty");
    }

    let program = &command[0];
    let args = &command[1..];

    let out = open_output(config.output.as_ref())?;
    let reporter = create_reporter(config.format, config.report, out);

    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("Failed to execute {}", program))?;
    let pid = child.id();
    tracing::info!("monitoring {} (pid {})", program, pid);

    let session = run_session(&mut child, reporter, &config);

    if let Err(e) = session {
        // Do not leave the program running unobserved
        let _ = child.kill();
        let _ = child.wait();
        return Err(e).context(format!("Monitoring of {} failed", program));
    }

    let status = child.wait().context("Failed to collect exit status")?;
    Ok(status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1))
}
