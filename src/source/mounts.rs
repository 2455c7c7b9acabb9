//! Mount table: which device backs which directory.
//!
//! Parsed from the output of the system `mount` command, whose lines look like
//!
//! ```text
//! /dev/vda9 on /data.local type xfs (rw,noatime)
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::error::{ObserverError, Result};

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub device: PathBuf,
    pub mountpoint: PathBuf,
}

impl Mount {
    /// Kernel name of the backing device, following a device symlink if there is one.
    ///
    /// `/dev/sda1` gives `sda1`; `/dev/mapper/root -> ../dm-0` gives `dm-0`.
    pub fn block_device(&self) -> Option<String> {
        let device = fs::read_link(&self.device).unwrap_or_else(|_| self.device.clone());
        device
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Mountpoints and their devices, in table order.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    /// Parse `mount` output: field 0 is the device, field 2 the mountpoint.
    ///
    /// Blank and short lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mounts = text
            .lines()
            .filter_map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() < 3 {
                    return None;
                }
                Some(Mount {
                    device: PathBuf::from(fields[0]),
                    mountpoint: PathBuf::from(fields[2]),
                })
            })
            .collect();
        Self { mounts }
    }

    /// Run `mount` and parse its output.
    pub fn from_system() -> Result<Self> {
        let output = Command::new("mount").output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ObserverError::SourceUnavailable(format!(
                "mount failed: {}",
                stderr.trim()
            )));
        }

        Ok(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Find the mount holding `path` by the longest matching mountpoint prefix.
    ///
    /// Later entries shadow earlier ones for the same mountpoint, as the
    /// kernel does for stacked mounts.
    pub fn resolve(&self, path: &Path) -> Option<&Mount> {
        path.ancestors().find_map(|ancestor| {
            self.mounts
                .iter()
                .rev()
                .find(|mount| mount.mountpoint == ancestor)
        })
    }
}
