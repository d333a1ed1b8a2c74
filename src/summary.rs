//! Whole-run aggregates reported when monitoring stops

use serde::Serialize;

use crate::sampler::CycleReport;

/// Totals gathered across every cycle of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub label: String,
    /// Wall time of the run in whole seconds
    pub wall_secs: u64,
    pub cycles: u64,
    pub peak_resident_bytes: u64,
    pub peak_active_cores: usize,
    /// Mean utilization of the busiest, second busiest, ... core
    pub mean_by_rank: Vec<f64>,
    #[serde(skip)]
    rank_totals: Vec<f64>,
}

impl RunSummary {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.peak_active_cores = self.peak_active_cores.max(report.active_cores);
        if let Some(bytes) = report.resident_bytes {
            self.peak_resident_bytes = self.peak_resident_bytes.max(bytes);
        }

        if self.rank_totals.len() < report.ranked.len() {
            self.rank_totals.resize(report.ranked.len(), 0.0);
        }
        for (total, value) in self.rank_totals.iter_mut().zip(&report.ranked) {
            *total += value;
        }
        let cycles = self.cycles as f64;
        self.mean_by_rank = self.rank_totals.iter().map(|t| t / cycles).collect();
    }

    pub fn set_wall_secs(&mut self, secs: u64) {
        self.wall_secs = secs;
    }

    pub fn peak_resident_mb(&self) -> f64 {
        self.peak_resident_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Mean by rank, cut to the ranks that were ever in use
    pub fn used_ranks(&self) -> &[f64] {
        let used = self.peak_active_cores.min(self.mean_by_rank.len());
        &self.mean_by_rank[..used]
    }
}
