//! Mode switches: timestamp rendering, datapoint shape, output encoding.

use serde::{Deserialize, Serialize};

/// How a timestamp is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeFormat {
    /// Whole seconds since the Unix epoch.
    #[default]
    Integer,

    /// Local wall clock as `YYYY-MM-DD HH:MM:SS`.
    Ascii,
}

/// How an encoded datapoint is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataFormat {
    /// The assembled [`Datapoint`](super::Datapoint) itself, unencoded.
    #[default]
    Native,

    /// One JSON object per datapoint.
    Json,

    /// One comma-separated line per datapoint, timestamp first.
    Csv,
}

/// Where the timestamp lives in the datapoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimePlacement {
    /// `{ name, <timestamp>: { field: value, .. } }`, for column-family stores.
    #[default]
    TimeAsKey,

    /// `{ name, time: <timestamp>, data: { field: value, .. } }`.
    TimeAsValue,
}

impl TimePlacement {
    /// The placement actually used for a given time format.
    ///
    /// ASCII timestamps are never used as map keys.
    pub fn effective(self, time: TimeFormat) -> Self {
        match time {
            TimeFormat::Ascii => Self::TimeAsValue,
            TimeFormat::Integer => self,
        }
    }
}
