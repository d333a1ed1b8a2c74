//! One sampling cycle: read, attribute, aggregate
//!
//! A cycle reads the system uptime and the thread list of the monitored
//! process, converts each thread's tick counters to seconds, asks the
//! [`ThreadStateTable`] for the utilization since the last cycle and routes it
//! to the thread's current core.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::accounting::AccountingSource;
use crate::aggregator::{CoreAggregator, CoreUtilizationVector, ReportMode};
use crate::clock::TickClock;
use crate::error::{Result, SampleError};
use crate::history::ThreadStateTable;
use crate::profiling::{ProfilingCategory, ProfilingContext};

/// Sizing and presentation of the per-cycle vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub cadence: Duration,
    pub core_count: usize,
    pub mode: ReportMode,
    pub top_n: Option<usize>,
}

/// One thread's attributed utilization in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThreadSample {
    pub tid: u32,
    pub core: usize,
    pub utilization: f64,
}

/// Everything observed in one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// Scheduled time of the cycle, seconds since monitoring started
    pub time_secs: f64,
    pub uptime: f64,
    /// Core totals as configured by [`ReportMode`]
    pub cores: CoreUtilizationVector,
    /// Core totals busiest first, full length
    #[serde(skip)]
    pub ranked: CoreUtilizationVector,
    pub active_cores: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_bytes: Option<u64>,
    pub threads: Vec<ThreadSample>,
}

/// Owns the cross-cycle state for one monitored process
#[derive(Debug)]
pub struct Sampler<S: AccountingSource> {
    source: S,
    pid: u32,
    tick: TickClock,
    settings: SamplerSettings,
    table: ThreadStateTable,
    aggregator: CoreAggregator,
    profiling: Option<ProfilingContext>,
}

impl<S: AccountingSource> Sampler<S> {
    /// Create a sampler whose first interval starts now
    pub fn new(source: S, pid: u32, tick: TickClock, settings: SamplerSettings) -> Result<Self> {
        if settings.core_count == 0 {
            return Err(SampleError::Config("core count must be positive".to_string()));
        }
        let baseline = source.read_system_uptime()?;
        Ok(Self {
            source,
            pid,
            tick,
            settings,
            table: ThreadStateTable::with_baseline(baseline),
            aggregator: CoreAggregator::new(settings.core_count),
            profiling: None,
        })
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled.then(ProfilingContext::new);
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn table(&self) -> &ThreadStateTable {
        &self.table
    }

    pub fn profiling(&self) -> Option<&ProfilingContext> {
        self.profiling.as_ref()
    }

    pub fn profile(&mut self, category: ProfilingCategory, duration: Duration) {
        if let Some(ctx) = self.profiling.as_mut() {
            ctx.record_time(category, duration);
        }
    }

    /// Sample every thread of the process once
    ///
    /// Returns `Ok(None)` when the process directory has vanished.
    pub fn run_cycle(&mut self, cycle: u64) -> Result<Option<CycleReport>> {
        let started = Instant::now();
        let uptime = self.source.read_system_uptime()?;
        let tids = match self.source.list_threads(self.pid) {
            Ok(tids) => tids,
            Err(e) if e.is_vanished() => {
                tracing::debug!("process {} directory vanished: {}", self.pid, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        self.profile(ProfilingCategory::Enumerate, started.elapsed());

        self.aggregator.begin_cycle(self.settings.core_count);
        let mut threads = Vec::with_capacity(tids.len());

        for tid in tids {
            let read_start = Instant::now();
            let record = match self.source.read_thread_record(self.pid, tid) {
                Ok(record) => record,
                Err(e) if e.is_vanished() => {
                    tracing::debug!("thread {} exited before it could be read", tid);
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.profile(ProfilingCategory::ThreadRead, read_start.elapsed());
            if let Some(ctx) = self.profiling.as_mut() {
                ctx.record_thread();
            }

            let attribution_start = Instant::now();
            let cpu_seconds = self.tick.ticks_to_seconds(record.cpu_ticks);
            let start_seconds = self.tick.ticks_to_seconds(record.start_tick);

            let utilization = match self.table.update(tid, uptime, cpu_seconds, start_seconds) {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!("skipping thread {} this cycle: {}", tid, e);
                    continue;
                }
            };

            if let Err(e) = self.aggregator.add(record.core, utilization) {
                tracing::warn!("dropping thread {} contribution: {}", tid, e);
                continue;
            }
            threads.push(ThreadSample {
                tid,
                core: record.core,
                utilization,
            });
            self.profile(ProfilingCategory::Attribution, attribution_start.elapsed());
        }

        let tail_start = Instant::now();
        self.table.finish_cycle(uptime);

        let resident_bytes = match self.source.read_resident_bytes(self.pid) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.is_vanished() => None,
            Err(e) => return Err(e),
        };

        let report = CycleReport {
            cycle,
            time_secs: self.settings.cadence.as_secs_f64() * cycle as f64,
            uptime,
            cores: self.aggregator.report(self.settings.mode, self.settings.top_n),
            ranked: self.aggregator.sorted_snapshot(),
            active_cores: self.aggregator.active_cores(),
            resident_bytes,
            threads,
        };
        self.profile(ProfilingCategory::Other, tail_start.elapsed());
        if let Some(ctx) = self.profiling.as_mut() {
            ctx.record_cycle();
        }

        Ok(Some(report))
    }
}
