//! Reporter sink for per-cycle vectors and the run summary
//!
//! The text format is the default; `json_output` and `csv_output` provide
//! the machine-readable ones.

use std::io::{self, Write};

use crate::aggregator::ReportMode;
use crate::cli::OutputFormat;
use crate::csv_output::CsvReporter;
use crate::json_output::JsonReporter;
use crate::sampler::CycleReport;
use crate::summary::RunSummary;

/// Static facts about a run, known before the first cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RunHeader {
    pub label: String,
    pub pid: u32,
    pub cadence_secs: f64,
    pub mode: ReportMode,
    /// Entries per reported vector
    pub columns: usize,
}

/// What the reporter should emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Per-thread detail alongside each vector
    pub verbose: bool,
    pub header: bool,
    pub steps: bool,
    pub summary: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            header: true,
            steps: true,
            summary: true,
        }
    }
}

/// Receives one report per cycle and a summary at the end
pub trait Reporter {
    fn begin(&mut self, header: &RunHeader) -> io::Result<()>;

    fn report_cycle(&mut self, report: &CycleReport) -> io::Result<()>;

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()>;
}

/// Build the reporter for `format` writing to `out`
pub fn create_reporter(
    format: OutputFormat,
    options: ReportOptions,
    out: Box<dyn Write>,
) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Text => Box::new(TextReporter::new(out, options)),
        OutputFormat::Json => Box::new(JsonReporter::new(out, options)),
        OutputFormat::Csv => Box::new(CsvReporter::new(out, options)),
    }
}

/// Column names for a run's vectors
pub fn column_names(mode: ReportMode, columns: usize) -> Vec<String> {
    (0..columns)
        .map(|i| match mode {
            ReportMode::Index => format!("core{}", i),
            ReportMode::Busiest => format!("top{}", i + 1),
        })
        .collect()
}

/// Human-readable columns, one line per cycle
pub struct TextReporter<W: Write> {
    out: W,
    options: ReportOptions,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W, options: ReportOptions) -> Self {
        Self { out, options }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn begin(&mut self, header: &RunHeader) -> io::Result<()> {
        if self.options.header && self.options.steps {
            write!(self.out, "{:<9}", "time(s)")?;
            for name in column_names(header.mode, header.columns) {
                write!(self.out, " {:>6}", name)?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn report_cycle(&mut self, report: &CycleReport) -> io::Result<()> {
        if !self.options.steps {
            return Ok(());
        }
        write!(self.out, "{:<9.1}", report.time_secs)?;
        for value in &report.cores {
            write!(self.out, " {:>6.2}", value)?;
        }
        writeln!(self.out)?;

        if self.options.verbose {
            for thread in &report.threads {
                writeln!(
                    self.out,
                    "  tid {:>7}  core {:>3}  {:.2}",
                    thread.tid, thread.core, thread.utilization
                )?;
            }
        }
        self.out.flush()
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        if self.options.summary {
            if self.options.header && self.options.steps {
                writeln!(self.out)?;
            }
            writeln!(self.out, "Label:    {}", summary.label)?;
            writeln!(self.out, "Time(s):  {}", summary.wall_secs)?;
            writeln!(self.out, "Mem(MB):  {:.1}", summary.peak_resident_mb())?;
            writeln!(self.out, "Cores:    {}", summary.peak_active_cores)?;
            let load: Vec<String> = summary
                .used_ranks()
                .iter()
                .map(|v| format!("{:.2}", v))
                .collect();
            writeln!(self.out, "Load:     {}", load.join(" "))?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ThreadSample;

    fn header(mode: ReportMode, columns: usize) -> RunHeader {
        RunHeader {
            label: "job".to_string(),
            pid: 99,
            cadence_secs: 1.0,
            mode,
            columns,
        }
    }

    fn cycle() -> CycleReport {
        CycleReport {
            cycle: 2,
            time_secs: 2.0,
            uptime: 50.0,
            cores: vec![0.25, 1.0],
            ranked: vec![1.0, 0.25],
            active_cores: 2,
            resident_bytes: Some(2 * 1024 * 1024),
            threads: vec![ThreadSample {
                tid: 1234,
                core: 1,
                utilization: 1.0,
            }],
        }
    }

    fn render(options: ReportOptions) -> String {
        let mut reporter = TextReporter::new(Vec::new(), options);
        reporter.begin(&header(ReportMode::Index, 2)).unwrap();
        let report = cycle();
        reporter.report_cycle(&report).unwrap();
        let mut summary = RunSummary::new("job");
        summary.record(&report);
        summary.set_wall_secs(3);
        reporter.finish(&summary).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_text_default_layout() {
        let out = render(ReportOptions::default());
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), "time(s)    core0  core1");
        assert_eq!(lines.next().unwrap(), "2.0         0.25   1.00");
        assert!(out.contains("Time(s):  3"));
        assert!(out.contains("Mem(MB):  2.0"));
        assert!(out.contains("Cores:    2"));
        assert!(out.contains("Load:     1.00 0.25"));
        assert!(!out.contains("tid"));
    }

    #[test]
    fn test_text_verbose_lists_threads() {
        let out = render(ReportOptions {
            verbose: true,
            ..Default::default()
        });
        assert!(out.contains("tid    1234  core   1  1.00"));
    }

    #[test]
    fn test_text_summary_only() {
        let out = render(ReportOptions {
            steps: false,
            ..Default::default()
        });
        assert!(out.starts_with("Label:    job"));
        assert!(!out.contains("core0"));
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_names(ReportMode::Index, 2), vec!["core0", "core1"]);
        assert_eq!(column_names(ReportMode::Busiest, 2), vec!["top1", "top2"]);
    }
}
