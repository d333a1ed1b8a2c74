//! Thread accounting reader over the `/proc` filesystem
//!
//! The field positions used here are fixed by the kernel ABI for
//! `/proc/<pid>/task/<tid>/stat` (see proc(5)). A record that cannot be split
//! at those positions is a fatal incompatibility, never a retry.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SampleError};

// Field indices counted from the state field, which follows the `(comm)` part.
const FIELD_UTIME: usize = 11;
const FIELD_STARTTIME: usize = 19;
const FIELD_RSS: usize = 21;
const FIELD_PROCESSOR: usize = 36;

/// One thread's raw accounting state for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRecord {
    pub tid: u32,
    pub cpu_ticks: u64,
    pub start_tick: u64,
    pub core: usize,
}

/// Source of per-thread accounting records and system uptime
///
/// Implemented by [`ProcFs`] for real systems and by test harnesses. All
/// operations report a disappearing file as [`SampleError::Vanished`].
pub trait AccountingSource {
    /// Thread ids of `pid`, in ascending order
    fn list_threads(&self, pid: u32) -> Result<Vec<u32>>;

    fn read_thread_record(&self, pid: u32, tid: u32) -> Result<ThreadRecord>;

    /// Seconds since boot
    fn read_system_uptime(&self) -> Result<f64>;

    /// Resident set size of `pid` in bytes
    fn read_resident_bytes(&self, pid: u32) -> Result<u64>;
}

/// Reads accounting data from a procfs mount
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    page_size: u64,
}

impl ProcFs {
    /// The system `/proc`
    pub fn new(page_size: u64) -> Self {
        Self::with_root("/proc", page_size)
    }

    /// A procfs-shaped tree rooted somewhere else
    pub fn with_root(root: impl Into<PathBuf>, page_size: u64) -> Self {
        Self {
            root: root.into(),
            page_size,
        }
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| SampleError::from_io(path, e))
    }
}

impl AccountingSource for ProcFs {
    fn list_threads(&self, pid: u32) -> Result<Vec<u32>> {
        let dir = self.root.join(pid.to_string()).join("task");
        let entries = fs::read_dir(&dir).map_err(|e| SampleError::from_io(&dir, e))?;

        let mut tids = Vec::new();
        for entry in entries {
            // Entries can disappear while the directory is being walked
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => match SampleError::from_io(&dir, e) {
                    SampleError::Vanished { .. } => continue,
                    other => return Err(other),
                },
            };
            if let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                tids.push(tid);
            }
        }
        tids.sort_unstable();
        Ok(tids)
    }

    fn read_thread_record(&self, pid: u32, tid: u32) -> Result<ThreadRecord> {
        let path = self
            .root
            .join(pid.to_string())
            .join("task")
            .join(tid.to_string())
            .join("stat");
        let line = self.read(&path)?;
        parse_stat_line(&line, tid).map_err(|reason| SampleError::Format { path, reason })
    }

    fn read_system_uptime(&self) -> Result<f64> {
        let path = self.root.join("uptime");
        let content = self.read(&path)?;
        parse_uptime(&content).map_err(|reason| SampleError::Format { path, reason })
    }

    fn read_resident_bytes(&self, pid: u32) -> Result<u64> {
        let path = self.root.join(pid.to_string()).join("stat");
        let line = self.read(&path)?;
        let fields = stat_fields(&line).map_err(|reason| SampleError::Format {
            path: path.clone(),
            reason,
        })?;
        let pages = parse_field(&fields, FIELD_RSS, "rss")
            .map_err(|reason| SampleError::Format { path, reason })?;
        Ok(pages * self.page_size)
    }
}

/// Split a stat line into the fields following `(comm)`
///
/// The command name may itself contain spaces and parentheses, so the split
/// point is the last `)` in the line.
fn stat_fields(line: &str) -> std::result::Result<Vec<&str>, String> {
    let comm_end = line
        .rfind(')')
        .ok_or_else(|| "missing ')' after command name".to_string())?;
    Ok(line[comm_end + 1..].split_ascii_whitespace().collect())
}

fn parse_field(fields: &[&str], index: usize, name: &str) -> std::result::Result<u64, String> {
    let raw = fields
        .get(index)
        .ok_or_else(|| format!("missing field '{}' (have {} fields)", name, fields.len()))?;
    raw.parse::<u64>()
        .map_err(|_| format!("field '{}' is not an unsigned integer: {:?}", name, raw))
}

/// Parse a `/proc/<pid>/task/<tid>/stat` line
pub fn parse_stat_line(line: &str, tid: u32) -> std::result::Result<ThreadRecord, String> {
    let fields = stat_fields(line)?;
    if fields.len() <= FIELD_PROCESSOR {
        return Err(format!(
            "expected at least {} fields after command name, found {}",
            FIELD_PROCESSOR + 1,
            fields.len()
        ));
    }
    Ok(ThreadRecord {
        tid,
        cpu_ticks: parse_field(&fields, FIELD_UTIME, "utime")?,
        start_tick: parse_field(&fields, FIELD_STARTTIME, "starttime")?,
        core: parse_field(&fields, FIELD_PROCESSOR, "processor")? as usize,
    })
}

/// Parse the first field of `/proc/uptime`
pub fn parse_uptime(content: &str) -> std::result::Result<f64, String> {
    let first = content
        .split_ascii_whitespace()
        .next()
        .ok_or_else(|| "empty uptime record".to_string())?;
    let uptime: f64 = first
        .parse()
        .map_err(|_| format!("uptime is not a number: {:?}", first))?;
    if !uptime.is_finite() || uptime < 0.0 {
        return Err(format!("uptime out of range: {}", uptime));
    }
    Ok(uptime)
}

/// Build a stat line with the given accounting values, for fixtures
pub fn format_stat_line(tid: u32, comm: &str, cpu_ticks: u64, start_tick: u64, core: usize) -> String {
    let mut fields = vec!["0".to_string(); FIELD_PROCESSOR + 16];
    fields[0] = "R".to_string();
    fields[FIELD_UTIME] = cpu_ticks.to_string();
    fields[FIELD_STARTTIME] = start_tick.to_string();
    fields[FIELD_PROCESSOR] = core.to_string();
    format!("{} ({}) {}\n", tid, comm, fields.join(" "))
}
