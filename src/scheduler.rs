//! Fixed-cadence sampling loop
//!
//! Wake times are computed against an absolute schedule,
//! `start + cycle * cadence`, so a slow cycle never shifts later ones. When a
//! cycle overruns its slot the next one starts immediately and the loop falls
//! back onto the ideal schedule afterwards.

use std::cell::{Cell, RefCell};
use std::process::Child;
use std::time::{Duration, Instant};

use crate::error::{Result, SampleError};

/// Source of wall time and suspension for the scheduler
pub trait WallClock {
    /// Time elapsed since the clock's own epoch
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

impl<T: WallClock + ?Sized> WallClock for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Monotonic clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when told to, for deterministic schedules
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate work taking `duration`
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Every sleep requested so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// The monitored process, as far as the scheduler cares
pub trait MonitoredProcess {
    fn pid(&self) -> u32;

    /// Non-blocking exit check
    fn has_exited(&mut self) -> Result<bool>;
}

impl MonitoredProcess for Child {
    fn pid(&self) -> u32 {
        self.id()
    }

    fn has_exited(&mut self) -> Result<bool> {
        let pid = self.id();
        self.try_wait()
            .map(|status| status.is_some())
            .map_err(|e| SampleError::from_io(format!("/proc/{}", pid), e))
    }
}

/// Result of one sampling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Continue,
    /// The process directory disappeared; treat as exit
    ProcessGone,
}

/// Work performed on every wake
pub trait CycleWork {
    fn sample(&mut self, cycle: u64) -> Result<CycleStatus>;

    /// Final best-effort read once the process is known to have exited
    fn drain(&mut self, cycle: u64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sampling,
    Draining,
    Stopped,
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Wakes performed, including the one that detected the exit
    pub cycles: u64,
    pub elapsed: Duration,
}

/// Drives [`CycleWork`] at a fixed cadence until the process exits
#[derive(Debug)]
pub struct SampleScheduler<C: WallClock> {
    cadence: Duration,
    clock: C,
    state: SchedulerState,
    cycle_count: u64,
    start: Duration,
}

impl<C: WallClock> SampleScheduler<C> {
    pub fn new(cadence: Duration, clock: C) -> Result<Self> {
        if cadence.is_zero() {
            return Err(SampleError::Config("cadence must be positive".to_string()));
        }
        Ok(Self {
            cadence,
            clock,
            state: SchedulerState::Idle,
            cycle_count: 0,
            start: Duration::ZERO,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Idle -> Sampling
    pub fn start(&mut self) {
        self.start = self.clock.now();
        self.cycle_count = 0;
        self.state = SchedulerState::Sampling;
    }

    /// Ideal wake time of `cycle`, relative to the clock epoch
    pub fn target_wake(&self, cycle: u64) -> Duration {
        let offset = u32::try_from(cycle)
            .ok()
            .and_then(|c| self.cadence.checked_mul(c))
            .unwrap_or(Duration::MAX);
        self.start.saturating_add(offset)
    }

    /// Advance to the next cycle and sleep until its slot
    ///
    /// Returns the time slept; zero when the previous cycle overran.
    pub fn wait_next(&mut self) -> Duration {
        self.cycle_count += 1;
        let target = self.target_wake(self.cycle_count);
        match target.checked_sub(self.clock.now()) {
            Some(residual) if !residual.is_zero() => {
                self.clock.sleep(residual);
                residual
            }
            _ => {
                tracing::debug!(
                    "cycle {} overran its slot, sampling immediately",
                    self.cycle_count
                );
                Duration::ZERO
            }
        }
    }

    /// Run the full state machine until the monitored process exits
    pub fn run<P, W>(&mut self, process: &mut P, work: &mut W) -> Result<RunOutcome>
    where
        P: MonitoredProcess + ?Sized,
        W: CycleWork + ?Sized,
    {
        self.start();

        while self.state == SchedulerState::Sampling {
            self.wait_next();

            if process.has_exited()? {
                tracing::info!("process {} exited", process.pid());
                self.state = SchedulerState::Draining;
                continue;
            }

            if work.sample(self.cycle_count)? == CycleStatus::ProcessGone {
                tracing::info!("process {} vanished during sampling", process.pid());
                self.state = SchedulerState::Draining;
            }
        }

        if self.state == SchedulerState::Draining {
            match work.drain(self.cycle_count) {
                Ok(()) => {}
                Err(e) if e.is_transient() => tracing::debug!("final read skipped: {}", e),
                Err(e) => return Err(e),
            }
            self.state = SchedulerState::Stopped;
        }

        Ok(RunOutcome {
            cycles: self.cycle_count,
            elapsed: self.clock.now().saturating_sub(self.start),
        })
    }
}
