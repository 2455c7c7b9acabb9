//! Process source: scheduling and memory counters from `/proc/<pid>/stat`.
//!
//! The fields kept are the ones that change over a process's life; start
//! time, command name and the like are static and left to the caller.
//! See proc(5) for the full layout.
//!
//! | field      | meaning                                                       |
//! |------------|---------------------------------------------------------------|
//! | `state`    | one of `RSDZTW` (running, sleeping, disk wait, zombie, ...)   |
//! | `minflt`   | minor faults (no page load from disk)                         |
//! | `cminflt`  | minor faults of waited-for children                           |
//! | `majflt`   | major faults (page loaded from disk)                          |
//! | `cmajflt`  | major faults of waited-for children                           |
//! | `utime`    | user-mode time, clock ticks                                   |
//! | `stime`    | kernel-mode time, clock ticks                                 |
//! | `priority` | negated RT priority minus one, or the raw nice value          |
//! | `nthreads` | thread count                                                  |
//! | `rss`      | resident set size, pages                                      |

use std::path::{Path, PathBuf};

use crate::error::{ObserverError, Result};
use crate::model::{FieldValue, Fields};

use super::{PROC_ROOT, Source, malformed, read_stat_line, unavailable_if_missing};

/// Field names, paired index-for-index with [`PROCESS_FIELD_INDEXES`].
pub const PROCESS_FIELDS: [&str; 10] = [
    "state", "minflt", "cminflt", "majflt", "cmajflt", "utime", "stime", "priority", "nthreads",
    "rss",
];

/// Zero-based positions in the stat line (proc(5) numbers minus one).
pub const PROCESS_FIELD_INDEXES: [usize; 10] = [2, 9, 10, 11, 12, 13, 14, 17, 19, 23];

/// Counters for one process, looked up by pid on every read.
#[derive(Debug, Clone)]
pub struct ProcessSource {
    pid: u32,
    stat_path: PathBuf,
}

impl ProcessSource {
    pub fn new(pid: u32) -> Self {
        Self::with_proc_root(pid, PROC_ROOT)
    }

    pub fn with_proc_root(pid: u32, proc_root: impl AsRef<Path>) -> Self {
        Self {
            pid,
            stat_path: proc_root.as_ref().join(pid.to_string()).join("stat"),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn not_found(&self) -> ObserverError {
        ObserverError::SourceUnavailable(format!("process {} not found", self.pid))
    }
}

impl Source for ProcessSource {
    fn kind(&self) -> &'static str {
        "process"
    }

    fn field_names(&self) -> &[&'static str] {
        &PROCESS_FIELDS
    }

    fn read(&mut self) -> Result<Fields> {
        if !self.stat_path.exists() {
            return Err(self.not_found());
        }

        // The process may exit between the check and the read.
        let line = read_stat_line(&self.stat_path)
            .map_err(|e| unavailable_if_missing(e, || format!("process {} not found", self.pid)))?;

        let tokens = split_stat_line(&line);
        let highest = PROCESS_FIELD_INDEXES.iter().max().copied().unwrap_or_default();
        if tokens.len() <= highest {
            return Err(malformed(
                &self.stat_path,
                format!("expected at least {} fields, found {}", highest + 1, tokens.len()),
            ));
        }

        Ok(PROCESS_FIELDS
            .iter()
            .zip(PROCESS_FIELD_INDEXES)
            .map(|(name, index)| (*name, FieldValue::from_raw(tokens[index])))
            .collect())
    }
}

/// Split a stat line into its proc(5) fields.
///
/// The command name (field 1) is wrapped in parentheses and may itself
/// contain spaces, so it is cut at the last `)` rather than split.
fn split_stat_line(line: &str) -> Vec<&str> {
    let (Some(open), Some(close)) = (line.find('('), line.rfind(')')) else {
        return line.split_whitespace().collect();
    };
    if close < open {
        return line.split_whitespace().collect();
    }

    let mut tokens = Vec::new();
    tokens.extend(line[..open].split_whitespace());
    tokens.push(&line[open..=close]);
    tokens.extend(line[close + 1..].split_whitespace());
    tokens
}
