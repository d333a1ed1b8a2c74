//! Self-profiling for the sampler
//!
//! Measures how much of each cycle the sampler itself spends enumerating
//! threads, reading records, attributing utilization and reporting, so the
//! cost of a cadence can be judged against the cadence itself.

use std::time::{Duration, Instant};

/// Categories of operations that can be profiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilingCategory {
    /// Listing `/proc/<pid>/task` and reading uptime
    Enumerate,
    /// Reading per-thread stat records
    ThreadRead,
    /// History lookup and core aggregation
    Attribution,
    /// Handing the cycle to the reporter
    Reporting,
    /// Memory read and report assembly at the end of a cycle
    Other,
}

/// Profiling context that tracks time spent in various operations
#[derive(Debug, Default)]
pub struct ProfilingContext {
    cycle_count: u64,
    threads_read: u64,
    enumerate_time: Duration,
    thread_read_time: Duration,
    attribution_time: Duration,
    reporting_time: Duration,
    other_time: Duration,
    start_time: Option<Instant>,
}

impl ProfilingContext {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_cycle(&mut self) {
        self.cycle_count += 1;
    }

    pub fn record_thread(&mut self) {
        self.threads_read += 1;
    }

    /// Measure the time taken by an operation
    ///
    /// # Example
    /// ```
    /// use percore::profiling::{ProfilingContext, ProfilingCategory};
    ///
    /// let mut ctx = ProfilingContext::new();
    /// let result = ctx.measure(ProfilingCategory::Attribution, || 2 + 2);
    /// assert_eq!(result, 4);
    /// ```
    pub fn measure<F, R>(&mut self, category: ProfilingCategory, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record_time(category, start.elapsed());
        result
    }

    pub fn record_time(&mut self, category: ProfilingCategory, duration: Duration) {
        match category {
            ProfilingCategory::Enumerate => self.enumerate_time += duration,
            ProfilingCategory::ThreadRead => self.thread_read_time += duration,
            ProfilingCategory::Attribution => self.attribution_time += duration,
            ProfilingCategory::Reporting => self.reporting_time += duration,
            ProfilingCategory::Other => self.other_time += duration,
        }
    }

    pub fn wall_time(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn threads_read(&self) -> u64 {
        self.threads_read
    }

    pub fn time_in_category(&self, category: ProfilingCategory) -> Duration {
        match category {
            ProfilingCategory::Enumerate => self.enumerate_time,
            ProfilingCategory::ThreadRead => self.thread_read_time,
            ProfilingCategory::Attribution => self.attribution_time,
            ProfilingCategory::Reporting => self.reporting_time,
            ProfilingCategory::Other => self.other_time,
        }
    }

    /// Time spent doing sampling work (sum of all categories)
    pub fn busy_time(&self) -> Duration {
        self.enumerate_time
            + self.thread_read_time
            + self.attribution_time
            + self.reporting_time
            + self.other_time
    }

    /// Print profiling summary to stderr
    pub fn print_summary(&self) {
        let wall = self.wall_time();
        let busy = self.busy_time();
        let idle = wall.saturating_sub(busy);

        eprintln!("\n╔════════════════════════════════════════════════════════════╗");
        eprintln!("║  percore Self-Profiling Results                            ║");
        eprintln!("╚════════════════════════════════════════════════════════════╝");
        eprintln!();
        eprintln!("Cycles sampled:            {}", self.cycle_count);
        eprintln!("Thread records read:       {}", self.threads_read);
        eprintln!("Total wall time:           {:.3}s", wall.as_secs_f64());
        eprintln!(
            "  - Sleeping:              {:.3}s ({:.1}%)",
            idle.as_secs_f64(),
            percent(idle, wall)
        );
        eprintln!(
            "  - Sampling:              {:.3}s ({:.1}%)",
            busy.as_secs_f64(),
            percent(busy, wall)
        );
        if self.cycle_count > 0 {
            eprintln!(
                "  - Per cycle:             {:.3}ms",
                busy.as_secs_f64() * 1000.0 / self.cycle_count as f64
            );
        }
        eprintln!();
        eprintln!("Sampling breakdown:");
        self.print_category("Enumeration", self.enumerate_time, busy);
        self.print_category("Thread reads", self.thread_read_time, busy);
        self.print_category("Attribution", self.attribution_time, busy);
        self.print_category("Reporting", self.reporting_time, busy);
        self.print_category("Other", self.other_time, busy);
        eprintln!();
    }

    fn print_category(&self, name: &str, time: Duration, total: Duration) {
        if time > Duration::ZERO {
            eprintln!(
                "  - {:20} {:.3}s ({:.1}%)",
                format!("{}:", name),
                time.as_secs_f64(),
                percent(time, total)
            );
        }
    }
}

fn percent(part: Duration, whole: Duration) -> f64 {
    if whole.is_zero() {
        0.0
    } else {
        part.as_secs_f64() / whole.as_secs_f64() * 100.0
    }
}
