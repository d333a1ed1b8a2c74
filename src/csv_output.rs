//! CSV output format for sampling runs
//!
//! Rows are streamed as cycles complete. The default layout has one row per
//! cycle and one column per reported core; verbose mode switches to one row
//! per thread.

use std::io::{self, Write};

use crate::reporter::{column_names, ReportOptions, Reporter, RunHeader};
use crate::sampler::CycleReport;
use crate::summary::RunSummary;

/// Streaming CSV reporter
pub struct CsvReporter<W: Write> {
    out: W,
    options: ReportOptions,
}

impl<W: Write> CsvReporter<W> {
    pub fn new(out: W, options: ReportOptions) -> Self {
        Self { out, options }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl<W: Write> Reporter for CsvReporter<W> {
    fn begin(&mut self, header: &RunHeader) -> io::Result<()> {
        if !(self.options.header && self.options.steps) {
            return Ok(());
        }
        if self.options.verbose {
            writeln!(self.out, "time,tid,core,utilization")
        } else {
            let mut headers = vec!["time".to_string()];
            headers.extend(column_names(header.mode, header.columns));
            writeln!(self.out, "{}", headers.join(","))
        }
    }

    fn report_cycle(&mut self, report: &CycleReport) -> io::Result<()> {
        if !self.options.steps {
            return Ok(());
        }
        if self.options.verbose {
            for thread in &report.threads {
                writeln!(
                    self.out,
                    "{:.3},{},{},{:.4}",
                    report.time_secs, thread.tid, thread.core, thread.utilization
                )?;
            }
        } else {
            let mut fields = vec![format!("{:.3}", report.time_secs)];
            fields.extend(report.cores.iter().map(|v| format!("{:.4}", v)));
            writeln!(self.out, "{}", fields.join(","))?;
        }
        self.out.flush()
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        if self.options.summary {
            let load: Vec<String> = summary
                .used_ranks()
                .iter()
                .map(|v| format!("{:.4}", v))
                .collect();
            writeln!(self.out)?;
            writeln!(
                self.out,
                "label,wall_secs,cycles,peak_mem_mb,peak_cores,mean_by_rank"
            )?;
            writeln!(
                self.out,
                "{},{},{},{:.1},{},{}",
                Self::escape_field(&summary.label),
                summary.wall_secs,
                summary.cycles,
                summary.peak_resident_mb(),
                summary.peak_active_cores,
                load.join(" ")
            )?;
        }
        self.out.flush()
    }
}
