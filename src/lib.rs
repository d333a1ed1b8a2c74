//! percore - per-core CPU utilization sampler
//!
//! This library samples the per-thread CPU accounting of a running process at
//! a fixed cadence and attributes each thread's consumption to the core it
//! last ran on, producing a time series of per-core utilization.

pub mod accounting;
pub mod aggregator;
pub mod cli;
pub mod clock;
pub mod csv_output;
pub mod error;
pub mod history;
pub mod json_output;
pub mod monitor;
pub mod profiling;
pub mod reporter;
pub mod sampler;
pub mod scheduler;
pub mod summary;
