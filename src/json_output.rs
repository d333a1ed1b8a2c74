//! JSON output format for sampling runs
//!
//! Cycles are collected in memory and written as one document when the run
//! finishes.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::aggregator::ReportMode;
use crate::reporter::{ReportOptions, Reporter, RunHeader};
use crate::sampler::CycleReport;
use crate::summary::RunSummary;

/// A thread's share of one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonThread {
    pub tid: u32,
    pub core: usize,
    pub utilization: f64,
}

/// One sampling cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCycle {
    pub cycle: u64,
    pub time_secs: f64,
    pub cores: Vec<f64>,
    pub active_cores: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_bytes: Option<u64>,
    /// Only present in verbose mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<JsonThread>>,
}

/// Whole-run totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub wall_secs: u64,
    pub cycles: u64,
    pub peak_resident_mb: f64,
    pub peak_active_cores: usize,
    pub mean_by_rank: Vec<f64>,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub label: String,
    pub pid: u32,
    pub cadence_secs: f64,
    pub mode: ReportMode,
    pub cycles: Vec<JsonCycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<JsonSummary>,
}

impl JsonOutput {
    pub fn new(header: &RunHeader) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "percore-json-v1".to_string(),
            label: header.label.clone(),
            pid: header.pid,
            cadence_secs: header.cadence_secs,
            mode: header.mode,
            cycles: Vec::new(),
            summary: None,
        }
    }

    pub fn add_cycle(&mut self, report: &CycleReport, verbose: bool) {
        let threads = verbose.then(|| {
            report
                .threads
                .iter()
                .map(|t| JsonThread {
                    tid: t.tid,
                    core: t.core,
                    utilization: t.utilization,
                })
                .collect()
        });
        self.cycles.push(JsonCycle {
            cycle: report.cycle,
            time_secs: report.time_secs,
            cores: report.cores.clone(),
            active_cores: report.active_cores,
            resident_bytes: report.resident_bytes,
            threads,
        });
    }

    pub fn set_summary(&mut self, summary: &RunSummary) {
        self.summary = Some(JsonSummary {
            wall_secs: summary.wall_secs,
            cycles: summary.cycles,
            peak_resident_mb: summary.peak_resident_mb(),
            peak_active_cores: summary.peak_active_cores,
            mean_by_rank: summary.used_ranks().to_vec(),
        });
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Reporter producing a single [`JsonOutput`] document
pub struct JsonReporter<W: Write> {
    out: W,
    options: ReportOptions,
    doc: Option<JsonOutput>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W, options: ReportOptions) -> Self {
        Self {
            out,
            options,
            doc: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn begin(&mut self, header: &RunHeader) -> io::Result<()> {
        self.doc = Some(JsonOutput::new(header));
        Ok(())
    }

    fn report_cycle(&mut self, report: &CycleReport) -> io::Result<()> {
        if let (true, Some(doc)) = (self.options.steps, self.doc.as_mut()) {
            doc.add_cycle(report, self.options.verbose);
        }
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        let Some(mut doc) = self.doc.take() else {
            return Ok(());
        };
        if self.options.summary {
            doc.set_summary(summary);
        }
        let json = doc.to_json().map_err(io::Error::other)?;
        writeln!(self.out, "{}", json)?;
        self.out.flush()
    }
}
