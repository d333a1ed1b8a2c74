//! Per-thread accounting history across sampling cycles
//!
//! Entries are created on first sight of a thread id and never removed
//! during a run. A thread that stops appearing simply stops being updated.

use std::collections::HashMap;

use crate::error::{Result, SampleError};

/// Last observed accounting state of one thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadHistory {
    pub tid: u32,
    pub last_cpu_seconds: f64,
    pub last_sample_uptime: f64,
}

/// Owns the history of every thread seen so far
#[derive(Debug, Default)]
pub struct ThreadStateTable {
    threads: HashMap<u32, ThreadHistory>,
    /// Uptime at the end of the previous cycle (or at startup)
    previous_uptime: Option<f64>,
}

impl ThreadStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose first cycle measures from `uptime`
    pub fn with_baseline(uptime: f64) -> Self {
        Self {
            threads: HashMap::new(),
            previous_uptime: Some(uptime),
        }
    }

    /// Compute the utilization of `tid` since its last observation
    ///
    /// A thread seen for the first time is measured from the later of its own
    /// start and the previous cycle, so a new thread is judged over the
    /// current interval only. On [`SampleError::InvalidInterval`] the history
    /// is left untouched.
    pub fn update(
        &mut self,
        tid: u32,
        current_uptime: f64,
        current_cpu_seconds: f64,
        thread_start_seconds: f64,
    ) -> Result<f64> {
        let (previous_timestamp, previous_cpu) = match self.threads.get(&tid) {
            Some(history) => (history.last_sample_uptime, history.last_cpu_seconds),
            None => {
                let baseline = match self.previous_uptime {
                    Some(previous) => previous.max(thread_start_seconds),
                    None => thread_start_seconds,
                };
                (baseline, 0.0)
            }
        };

        let elapsed = current_uptime - previous_timestamp;
        if elapsed <= 0.0 || !elapsed.is_finite() {
            return Err(SampleError::InvalidInterval { tid, elapsed });
        }

        let mut cpu_delta = current_cpu_seconds - previous_cpu;
        // The new reading is genuine, so the baseline follows the counter down;
        // keeping the old value would hide the thread's load until it caught up
        if cpu_delta < 0.0 {
            tracing::debug!(
                "thread {}: CPU counter went backwards by {:.3}s, treating as idle",
                tid,
                -cpu_delta
            );
            cpu_delta = 0.0;
        }

        self.threads.insert(
            tid,
            ThreadHistory {
                tid,
                last_cpu_seconds: current_cpu_seconds,
                last_sample_uptime: current_uptime,
            },
        );

        Ok(cpu_delta / elapsed)
    }

    /// Record the uptime at which the current cycle was sampled
    pub fn finish_cycle(&mut self, uptime: f64) {
        self.previous_uptime = Some(uptime);
    }

    pub fn previous_uptime(&self) -> Option<f64> {
        self.previous_uptime
    }

    pub fn get(&self, tid: u32) -> Option<&ThreadHistory> {
        self.threads.get(&tid)
    }

    /// Number of threads ever observed, including ones that have exited
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_steady_state_utilization() {
        let mut table = ThreadStateTable::with_baseline(100.0);
        let u = table.update(1, 101.0, 0.5, 50.0).unwrap();
        assert!((u - 0.5).abs() < EPS);

        let u = table.update(1, 102.0, 1.25, 50.0).unwrap();
        assert!((u - 0.75).abs() < EPS);
    }

    #[test]
    fn test_first_observation_uses_previous_cycle_when_later() {
        // Thread started at 10s, previous cycle at 99s: interval is 99..100
        let mut table = ThreadStateTable::with_baseline(99.0);
        let u = table.update(7, 100.0, 0.4, 10.0).unwrap();
        assert!((u - 0.4).abs() < EPS);
    }

    #[test]
    fn test_first_observation_uses_thread_start_when_later() {
        // Thread born halfway through the interval
        let mut table = ThreadStateTable::with_baseline(99.0);
        let u = table.update(7, 100.0, 0.25, 99.5).unwrap();
        assert!((u - 0.5).abs() < EPS);
    }

    #[test]
    fn test_first_observation_without_baseline_uses_start() {
        let mut table = ThreadStateTable::new();
        let u = table.update(3, 20.0, 5.0, 10.0).unwrap();
        assert!((u - 0.5).abs() < EPS);
    }

    #[test]
    fn test_zero_interval_is_rejected_and_not_recorded() {
        let mut table = ThreadStateTable::with_baseline(100.0);
        let err = table.update(9, 100.0, 1.0, 100.0).unwrap_err();
        assert!(matches!(err, SampleError::InvalidInterval { tid: 9, .. }));
        assert!(table.get(9).is_none());
    }

    #[test]
    fn test_invalid_interval_keeps_existing_history() {
        let mut table = ThreadStateTable::with_baseline(100.0);
        table.update(1, 101.0, 0.5, 0.0).unwrap();
        assert!(table.update(1, 101.0, 0.9, 0.0).is_err());
        let history = table.get(1).unwrap();
        assert_eq!(history.last_cpu_seconds, 0.5);
        assert_eq!(history.last_sample_uptime, 101.0);
    }

    #[test]
    fn test_negative_delta_clamps_to_zero() {
        let mut table = ThreadStateTable::with_baseline(100.0);
        table.update(1, 101.0, 5.0, 0.0).unwrap();
        let u = table.update(1, 102.0, 2.0, 0.0).unwrap();
        assert_eq!(u, 0.0);
        let history = table.get(1).unwrap();
        assert_eq!(history.last_cpu_seconds, 2.0);
        assert_eq!(history.last_sample_uptime, 102.0);

        // Next interval is measured from the lower reading, not from 5.0
        let u = table.update(1, 103.0, 2.5, 0.0).unwrap();
        assert!((u - 0.5).abs() < EPS);
    }

    #[test]
    fn test_stale_entries_are_kept() {
        let mut table = ThreadStateTable::with_baseline(0.0);
        table.update(1, 1.0, 0.1, 0.0).unwrap();
        table.update(2, 1.0, 0.1, 0.0).unwrap();
        table.finish_cycle(1.0);
        table.update(1, 2.0, 0.2, 0.0).unwrap();
        table.finish_cycle(2.0);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(2).unwrap().last_sample_uptime, 1.0);
        assert_eq!(table.previous_uptime(), Some(2.0));
    }
}
