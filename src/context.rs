//! Static context: facts about the host that do not change while observing.
//!
//! Read once, then exposed as a read-only, ordered key/value map that
//! serializes as a JSON object. Useful as a header for a run's output.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::model::{FieldValue, Fields};
use crate::source::PROC_ROOT;

pub const HOSTNAME: &str = "hostname";
pub const KERNEL: &str = "kernel";
pub const CPU_MODEL: &str = "cpu_model";
pub const CPU_NCORES: &str = "cpu_ncores";

/// Errors that can occur while reading host context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("could not determine hostname: {0}")]
    Hostname(io::Error),

    #[error("value for key \"{0}\" not found")]
    MissingValue(String),

    #[error("value for key \"{key}\" is not a number: {value:?}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = core::result::Result<T, ContextError>;

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ContextError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Operating system identity: hostname and kernel release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OsContext {
    items: Fields,
}

impl OsContext {
    pub fn read() -> Result<Self> {
        Self::with_proc_root(PROC_ROOT)
    }

    /// Kernel release from `<proc_root>/sys/kernel/osrelease`.
    pub fn with_proc_root(proc_root: impl AsRef<Path>) -> Result<Self> {
        let hostname = hostname::get().map_err(ContextError::Hostname)?;
        let release = read_file(&proc_root.as_ref().join("sys/kernel/osrelease"))?;

        let mut items = Fields::default();
        items.insert(HOSTNAME, FieldValue::Text(hostname.to_string_lossy().into_owned()));
        items.insert(KERNEL, FieldValue::Text(release.trim().to_string()));
        Ok(Self { items })
    }

    pub fn hostname(&self) -> &str {
        text(&self.items, HOSTNAME)
    }

    pub fn kernel(&self) -> &str {
        text(&self.items, KERNEL)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.items.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// CPU model and core count, from `/proc/cpuinfo`.
///
/// Only the first processor block that names a key is used; on a
/// homogeneous machine they all agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HardwareContext {
    items: Fields,
}

impl HardwareContext {
    pub fn read() -> Result<Self> {
        Self::from_cpuinfo(Path::new(PROC_ROOT).join("cpuinfo"))
    }

    pub fn from_cpuinfo(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&read_file(path.as_ref())?)
    }

    pub fn parse(cpuinfo: &str) -> Result<Self> {
        let model = cpuinfo_value(cpuinfo, "model name")
            .ok_or_else(|| ContextError::MissingValue("model name".to_string()))?;
        let cores = cpuinfo_value(cpuinfo, "cpu cores")
            .ok_or_else(|| ContextError::MissingValue("cpu cores".to_string()))?;
        let cores: i64 = cores.parse().map_err(|_| ContextError::InvalidValue {
            key: "cpu cores".to_string(),
            value: cores.to_string(),
        })?;

        let mut items = Fields::default();
        items.insert(CPU_MODEL, FieldValue::Text(model.to_string()));
        items.insert(CPU_NCORES, FieldValue::Integer(cores));
        Ok(Self { items })
    }

    pub fn cpu_model(&self) -> &str {
        text(&self.items, CPU_MODEL)
    }

    pub fn cpu_ncores(&self) -> i64 {
        self.items
            .get(CPU_NCORES)
            .and_then(FieldValue::as_integer)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.items.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// First `key : value` line in cpuinfo whose key matches exactly.
fn cpuinfo_value<'a>(cpuinfo: &'a str, key: &str) -> Option<&'a str> {
    cpuinfo.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim())
    })
}

fn text<'a>(items: &'a Fields, key: &str) -> &'a str {
    match items.get(key) {
        Some(FieldValue::Text(s)) => s,
        _ => "",
    }
}
