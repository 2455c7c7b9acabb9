//! Metric sources: read raw fields from the system.
//!
//! Each source kind has its own submodule that knows where its numbers
//! live and how to split them into named fields. Sources open their file
//! on every read; no handle is held between samples.

mod cpu;
mod mounts;
mod process;
mod random;
mod storage;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub use cpu::{CPU_FIELDS, CpuSource};
pub use mounts::{Mount, MountTable};
pub use process::{PROCESS_FIELD_INDEXES, PROCESS_FIELDS, ProcessSource};
pub use random::{RandomSource, TEST_FIELDS};
pub use storage::{BLOCK_STAT_FIELDS, StorageSource};

use crate::error::{ObserverError, Result};
use crate::model::Fields;

/// Default mount point of procfs.
pub const PROC_ROOT: &str = "/proc";

/// Default mount point of sysfs.
pub const SYS_ROOT: &str = "/sys";

/// Something an observer can sample.
///
/// Implementations return every name in [`Source::field_names`] on a
/// successful read, or fail without returning partial data.
pub trait Source: Send {
    /// Short label for logs (e.g. `"storage"`).
    fn kind(&self) -> &'static str;

    /// Metric names in canonical order. Also the CSV column order.
    fn field_names(&self) -> &[&'static str];

    /// Read the current values.
    fn read(&mut self) -> Result<Fields>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn field_names(&self) -> &[&'static str] {
        (**self).field_names()
    }

    fn read(&mut self) -> Result<Fields> {
        (**self).read()
    }
}

/// Read the first line of a single-line stats file, trimmed.
fn read_stat_line(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path)?;
    let line = contents.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return Err(malformed(path, "file is empty"));
    }
    Ok(line.to_string())
}

fn malformed(path: &Path, reason: impl Into<String>) -> ObserverError {
    ObserverError::MalformedSource {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

/// Map a not-found error onto [`ObserverError::SourceUnavailable`].
fn unavailable_if_missing(err: ObserverError, message: impl FnOnce() -> String) -> ObserverError {
    match err {
        ObserverError::Io(e) if e.kind() == io::ErrorKind::NotFound => {
            ObserverError::SourceUnavailable(message())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn stat_line_is_trimmed_first_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stat");
        fs::write(&path, "   1 2 3  \nignored\n").unwrap();

        assert_eq!(read_stat_line(&path).unwrap(), "1 2 3");
    }

    #[test]
    fn empty_stat_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stat");
        fs::write(&path, "\n").unwrap();

        let err = read_stat_line(&path).unwrap_err();
        assert!(matches!(err, ObserverError::MalformedSource { .. }));
    }

    #[test]
    fn missing_file_maps_to_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = read_stat_line(&dir.path().join("nope")).unwrap_err();
        let err = unavailable_if_missing(err, || "gone".to_string());

        assert!(matches!(err, ObserverError::SourceUnavailable(msg) if msg == "gone"));
    }

    #[test]
    fn boxed_sources_delegate() {
        let mut source: Box<dyn Source> = Box::new(RandomSource::new());
        assert_eq!(source.kind(), "test");
        assert_eq!(source.read().unwrap().len(), source.field_names().len());
    }
}
