//! Find processes by command line, for picking a pid to observe.

use std::{fs, path::Path};

use crate::error::Result;
use crate::source::PROC_ROOT;

/// Pids whose command line contains `pattern`, ascending.
pub fn pids_by_name(pattern: &str) -> Result<Vec<u32>> {
    pids_by_name_in(PROC_ROOT, pattern)
}

/// Like [`pids_by_name`], scanning an alternate procfs root.
///
/// Arguments in `cmdline` are NUL-separated; they are joined with spaces
/// before matching. Entries that vanish mid-scan are skipped.
pub fn pids_by_name_in(proc_root: impl AsRef<Path>, pattern: &str) -> Result<Vec<u32>> {
    let mut pids = Vec::new();

    for entry in fs::read_dir(proc_root)? {
        let Ok(entry) = entry else { continue };
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
            continue;
        };

        let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ");
        if cmdline.contains(pattern) {
            pids.push(pid);
        }
    }

    pids.sort_unstable();
    Ok(pids)
}
