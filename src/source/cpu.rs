//! CPU source: aggregate CPU time from `/proc/stat`.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{FieldValue, Fields};

use super::{PROC_ROOT, Source, malformed, read_stat_line};

/// Columns of the aggregate `cpu` line, in clock ticks.
pub const CPU_FIELDS: [&str; 8] = [
    "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal",
];

/// Reads the first (`cpu `) line of `<proc>/stat`.
#[derive(Debug, Clone)]
pub struct CpuSource {
    stat_path: PathBuf,
}

impl CpuSource {
    pub fn new() -> Self {
        Self::with_proc_root(PROC_ROOT)
    }

    pub fn with_proc_root(proc_root: impl AsRef<Path>) -> Self {
        Self {
            stat_path: proc_root.as_ref().join("stat"),
        }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for CpuSource {
    fn kind(&self) -> &'static str {
        "cpu"
    }

    fn field_names(&self) -> &[&'static str] {
        &CPU_FIELDS
    }

    fn read(&mut self) -> Result<Fields> {
        let line = read_stat_line(&self.stat_path)?;
        let mut tokens = line.split_whitespace();

        if tokens.next() != Some("cpu") {
            return Err(malformed(&self.stat_path, "first line is not the aggregate cpu line"));
        }

        let values: Vec<&str> = tokens.take(CPU_FIELDS.len()).collect();
        if values.len() < CPU_FIELDS.len() {
            return Err(malformed(
                &self.stat_path,
                format!(
                    "expected {} cpu columns, found {}",
                    CPU_FIELDS.len(),
                    values.len()
                ),
            ));
        }

        Ok(CPU_FIELDS
            .iter()
            .zip(values)
            .map(|(name, raw)| (*name, FieldValue::from_raw(raw)))
            .collect())
    }
}
