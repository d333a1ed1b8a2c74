//! Error taxonomy for the sampling core
//!
//! Fatal conditions (tick frequency, record layout, unexpected I/O) abort the
//! run. Everything else is recovered locally by the caller: a vanished thread
//! is skipped, a vanished process directory ends the run, and a bad interval
//! or core id drops one thread's contribution for one cycle.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading accounting data or attributing utilization
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Tick frequency unavailable or non-positive: {0}")]
    TickFrequency(i64),

    #[error("Unexpected record layout in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("{path} vanished")]
    Vanished { path: PathBuf },

    #[error("Invalid sampling interval for thread {tid}: {elapsed}s")]
    InvalidInterval { tid: u32, elapsed: f64 },

    #[error("Core id {core} outside configured range 0..{core_count}")]
    InvalidCore { core: usize, core_count: usize },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

/// Result type for sampling operations
pub type Result<T> = std::result::Result<T, SampleError>;

impl SampleError {
    /// Classify an I/O error on `path`, folding "no such file" and
    /// "no such process" into [`SampleError::Vanished`]
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let gone = source.kind() == std::io::ErrorKind::NotFound
            || source.raw_os_error() == Some(nix::errno::Errno::ESRCH as i32);
        if gone {
            SampleError::Vanished { path }
        } else {
            SampleError::Io { path, source }
        }
    }

    /// True when the condition is expected control flow rather than a fault
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SampleError::Vanished { .. }
                | SampleError::InvalidInterval { .. }
                | SampleError::InvalidCore { .. }
        )
    }

    pub fn is_vanished(&self) -> bool {
        matches!(self, SampleError::Vanished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_not_found_maps_to_vanished() {
        let err = SampleError::from_io("/proc/1/task/2/stat", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_vanished());
        assert!(err.is_transient());
    }

    #[test]
    fn test_esrch_maps_to_vanished() {
        let raw = io::Error::from_raw_os_error(nix::errno::Errno::ESRCH as i32);
        let err = SampleError::from_io("/proc/1/task/2/stat", raw);
        assert!(err.is_vanished());
    }

    #[test]
    fn test_permission_denied_is_fatal() {
        let err = SampleError::from_io(
            "/proc/1/task",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, SampleError::Io { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_format_error_is_fatal() {
        let err = SampleError::Format {
            path: PathBuf::from("/proc/uptime"),
            reason: "empty".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("/proc/uptime"));
    }

    #[test]
    fn test_invalid_core_message() {
        let err = SampleError::InvalidCore {
            core: 5,
            core_count: 4,
        };
        assert_eq!(err.to_string(), "Core id 5 outside configured range 0..4");
    }
}
