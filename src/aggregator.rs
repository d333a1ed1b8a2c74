//! Folds per-thread utilization into per-core totals for one cycle

use serde::{Deserialize, Serialize};

use crate::error::{Result, SampleError};

/// How a cycle's core vector is presented to the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Entry `i` is the load of core `i`
    #[default]
    Index,
    /// Entries sorted busiest first, truncated to the workers of interest
    Busiest,
}

/// Per-core utilization totals of one completed cycle
pub type CoreUtilizationVector = Vec<f64>;

/// Per-cycle accumulator indexed by core id
#[derive(Debug, Clone, Default)]
pub struct CoreAggregator {
    totals: Vec<f64>,
    touched: Vec<bool>,
}

impl CoreAggregator {
    pub fn new(core_count: usize) -> Self {
        let mut aggregator = Self::default();
        aggregator.begin_cycle(core_count);
        aggregator
    }

    /// Reset to `core_count` zeros
    pub fn begin_cycle(&mut self, core_count: usize) {
        self.totals.clear();
        self.totals.resize(core_count, 0.0);
        self.touched.clear();
        self.touched.resize(core_count, false);
    }

    /// Route one thread's utilization to `core`
    pub fn add(&mut self, core: usize, utilization: f64) -> Result<()> {
        let core_count = self.totals.len();
        match self.totals.get_mut(core) {
            Some(total) => {
                *total += utilization;
                self.touched[core] = true;
                Ok(())
            }
            None => Err(SampleError::InvalidCore { core, core_count }),
        }
    }

    pub fn core_count(&self) -> usize {
        self.totals.len()
    }

    /// Cores that received at least one contribution this cycle
    pub fn active_cores(&self) -> usize {
        self.touched.iter().filter(|&&t| t).count()
    }

    /// Totals in core index order
    pub fn snapshot(&self) -> CoreUtilizationVector {
        self.totals.clone()
    }

    /// Totals sorted busiest first
    pub fn sorted_snapshot(&self) -> CoreUtilizationVector {
        let mut sorted = self.totals.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        sorted
    }

    /// Totals as the reporter should see them under `mode`
    pub fn report(&self, mode: ReportMode, top_n: Option<usize>) -> CoreUtilizationVector {
        match mode {
            ReportMode::Index => self.snapshot(),
            ReportMode::Busiest => {
                let mut sorted = self.sorted_snapshot();
                if let Some(n) = top_n {
                    sorted.truncate(n);
                }
                sorted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_contributions_by_core() {
        let mut agg = CoreAggregator::new(4);
        agg.add(0, 0.30).unwrap();
        agg.add(2, 0.50).unwrap();
        assert_eq!(agg.snapshot(), vec![0.30, 0.0, 0.50, 0.0]);
        assert_eq!(agg.active_cores(), 2);
    }

    #[test]
    fn test_same_core_contributions_sum() {
        let mut agg = CoreAggregator::new(2);
        agg.add(1, 0.25).unwrap();
        agg.add(1, 0.5).unwrap();
        assert_eq!(agg.snapshot(), vec![0.0, 0.75]);
        assert_eq!(agg.active_cores(), 1);
    }

    #[test]
    fn test_begin_cycle_resets_to_zero() {
        let mut agg = CoreAggregator::new(3);
        agg.add(0, 0.9).unwrap();
        agg.add(2, 0.1).unwrap();
        agg.begin_cycle(3);
        assert_eq!(agg.snapshot(), vec![0.0, 0.0, 0.0]);
        assert_eq!(agg.active_cores(), 0);
    }

    #[test]
    fn test_out_of_range_core_is_rejected() {
        let mut agg = CoreAggregator::new(4);
        agg.add(1, 0.2).unwrap();
        let err = agg.add(5, 0.7).unwrap_err();
        assert!(matches!(
            err,
            SampleError::InvalidCore {
                core: 5,
                core_count: 4
            }
        ));
        assert_eq!(agg.snapshot(), vec![0.0, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_busiest_mode_sorts_and_truncates() {
        let mut agg = CoreAggregator::new(4);
        agg.add(0, 0.1).unwrap();
        agg.add(1, 0.9).unwrap();
        agg.add(3, 0.4).unwrap();

        assert_eq!(agg.report(ReportMode::Busiest, None), vec![0.9, 0.4, 0.1, 0.0]);
        assert_eq!(agg.report(ReportMode::Busiest, Some(2)), vec![0.9, 0.4]);
        assert_eq!(agg.report(ReportMode::Index, Some(2)), vec![0.1, 0.9, 0.0, 0.4]);
    }
}
