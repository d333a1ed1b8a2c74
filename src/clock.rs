//! Kernel tick conversion and one-time system queries
//!
//! CPU time in `/proc/<pid>/task/<tid>/stat` is counted in clock ticks
//! (USER_HZ). The tick rate, core counts and page size are read once at
//! startup and handed to every component that needs them.

use nix::sched::{sched_getaffinity, CpuSet};
use nix::unistd::{sysconf, Pid, SysconfVar};

use crate::error::{Result, SampleError};

/// Converts scheduler ticks to seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickClock {
    ticks_per_second: u64,
}

impl TickClock {
    /// Build a clock from a known tick frequency
    pub fn new(ticks_per_second: i64) -> Result<Self> {
        if ticks_per_second <= 0 {
            return Err(SampleError::TickFrequency(ticks_per_second));
        }
        Ok(Self {
            ticks_per_second: ticks_per_second as u64,
        })
    }

    /// Query `sysconf(CLK_TCK)`
    pub fn from_system() -> Result<Self> {
        match sysconf(SysconfVar::CLK_TCK) {
            Ok(Some(tck)) => Self::new(tck as i64),
            _ => Err(SampleError::TickFrequency(-1)),
        }
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_second as f64
    }
}

/// Process-wide constants gathered during initialization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemInfo {
    pub tick: TickClock,
    /// Cores the kernel reports online; sizes the aggregation vector
    pub online_cores: usize,
    /// Cores in our affinity mask; default number of workers of interest
    pub affinity_cores: usize,
    pub page_size: u64,
}

impl SystemInfo {
    pub fn query() -> Result<Self> {
        let tick = TickClock::from_system()?;

        let online_cores = match sysconf(SysconfVar::_NPROCESSORS_ONLN) {
            Ok(Some(n)) if n > 0 => n as usize,
            _ => {
                return Err(SampleError::Config(
                    "could not determine the number of online cores".to_string(),
                ))
            }
        };

        let affinity_cores = match sched_getaffinity(Pid::from_raw(0)) {
            Ok(set) => (0..CpuSet::count())
                .filter(|&i| set.is_set(i).unwrap_or(false))
                .count(),
            Err(e) => {
                tracing::warn!("sched_getaffinity failed ({}), assuming all cores", e);
                online_cores
            }
        };

        let page_size = match sysconf(SysconfVar::PAGE_SIZE) {
            Ok(Some(n)) if n > 0 => n as u64,
            _ => 4096,
        };

        Ok(Self {
            tick,
            online_cores,
            affinity_cores: affinity_cores.max(1),
            page_size,
        })
    }
}
