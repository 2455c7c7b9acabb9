//! Storage source: block I/O statistics for the device behind a directory.
//!
//! Counters come from `<sys>/block/<dev>/stat`; see the kernel's
//! `Documentation/iostats.txt` for their meaning.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{ObserverError, Result};
use crate::model::{FieldValue, Fields};

use super::{MountTable, SYS_ROOT, Source, malformed, read_stat_line, unavailable_if_missing};

/// The eleven block-stat counters, in file order.
pub const BLOCK_STAT_FIELDS: [&str; 11] = [
    "rd_comp", "rd_mrgd", "rd_blk", "rd_tm", "wr_comp", "wr_mrgd", "wr_blk", "wr_tm", "io_prog",
    "io_tm", "io_tmw",
];

/// Block I/O counters for the partition holding a directory.
#[derive(Debug, Clone)]
pub struct StorageSource {
    target: PathBuf,
    device: String,
    stat_path: PathBuf,
}

impl StorageSource {
    /// Resolve `target` against the live mount table and `/sys`.
    pub fn new(target: impl AsRef<Path>) -> Result<Self> {
        let target = existing_path(target.as_ref())?;
        let table = MountTable::from_system()?;
        Self::resolve(target, &table, Path::new(SYS_ROOT))
    }

    /// Resolve `target` against a given mount table and sysfs root.
    pub fn with_mount_table(
        target: impl AsRef<Path>,
        table: &MountTable,
        sys_root: impl AsRef<Path>,
    ) -> Result<Self> {
        let target = existing_path(target.as_ref())?;
        Self::resolve(target, table, sys_root.as_ref())
    }

    fn resolve(target: PathBuf, table: &MountTable, sys_root: &Path) -> Result<Self> {
        let mount = table.resolve(&target).ok_or_else(|| {
            ObserverError::SourceUnavailable(format!(
                "partition for \"{}\" directory not found",
                target.display()
            ))
        })?;

        let device = mount.block_device().ok_or_else(|| {
            ObserverError::SourceUnavailable(format!(
                "mount entry for \"{}\" has no device name",
                mount.mountpoint.display()
            ))
        })?;

        let stat_path = find_stat_path(sys_root, &device).ok_or_else(|| {
            ObserverError::SourceUnavailable(format!("no block statistics for device {device}"))
        })?;

        debug!(
            target = %target.display(),
            device = %device,
            stat = %stat_path.display(),
            "resolved storage source"
        );

        Ok(Self {
            target,
            device,
            stat_path,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Kernel name of the block device, e.g. `sda1`.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn stat_path(&self) -> &Path {
        &self.stat_path
    }
}

impl Source for StorageSource {
    fn kind(&self) -> &'static str {
        "storage"
    }

    fn field_names(&self) -> &[&'static str] {
        &BLOCK_STAT_FIELDS
    }

    fn read(&mut self) -> Result<Fields> {
        let line = read_stat_line(&self.stat_path).map_err(|e| {
            unavailable_if_missing(e, || format!("device {} has gone away", self.device))
        })?;

        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() < BLOCK_STAT_FIELDS.len() {
            return Err(malformed(
                &self.stat_path,
                format!(
                    "expected {} counters, found {}",
                    BLOCK_STAT_FIELDS.len(),
                    values.len()
                ),
            ));
        }

        Ok(BLOCK_STAT_FIELDS
            .iter()
            .zip(values)
            .map(|(name, raw)| (*name, FieldValue::from_raw(raw)))
            .collect())
    }
}

/// The target must exist at setup; it is canonicalized so it lines up with mountpoints.
fn existing_path(target: &Path) -> Result<PathBuf> {
    if !target.exists() {
        return Err(ObserverError::SourceUnavailable(format!(
            "no such path \"{}\"",
            target.display()
        )));
    }
    Ok(fs::canonicalize(target)?)
}

/// Locate the stat file for `device`.
///
/// Tries the flat layout (`block/sda/stat`) first, then the layout that
/// nests a partition under its whole disk (`block/sda/sda1/stat`).
fn find_stat_path(sys_root: &Path, device: &str) -> Option<PathBuf> {
    let block = sys_root.join("block");

    let mut candidates = vec![block.join(device).join("stat")];
    for base in parent_devices(device) {
        candidates.push(block.join(base).join(device).join("stat"));
    }

    candidates.into_iter().find(|path| path.is_file())
}

/// Candidate whole-disk names for a partition: `sda1` → `sda`, `nvme0n1p2` → `nvme0n1p`, `nvme0n1`.
fn parent_devices(device: &str) -> Vec<&str> {
    let trimmed = device.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.is_empty() || trimmed == device {
        return Vec::new();
    }

    let mut bases = vec![trimmed];
    if let Some(without_p) = trimmed.strip_suffix('p')
        && without_p.ends_with(|c: char| c.is_ascii_digit())
    {
        bases.push(without_p);
    }
    bases
}
