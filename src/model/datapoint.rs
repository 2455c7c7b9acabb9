//! Datapoint: one sampled observation of a source.

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use super::{Fields, TimeFormat, TimePlacement};

/// When a datapoint was taken, rendered per the observer's [`TimeFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Seconds since the Unix epoch.
    Integer(i64),

    /// `YYYY-MM-DD HH:MM:SS` in local time.
    Ascii(String),
}

impl Timestamp {
    pub fn format(&self) -> TimeFormat {
        match self {
            Self::Integer(_) => TimeFormat::Integer,
            Self::Ascii(_) => TimeFormat::Ascii,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Ascii(_) => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Ascii(s) => f.write_str(s),
        }
    }
}

/// A single observation: who observed it, when, and what was read.
///
/// Exactly one timestamp is attached to one read's fields. The shape it
/// serializes to depends on [`TimePlacement`]:
///
/// ```text
/// time-as-key:   {"name": "cpu", "1400620976": {"user": 12, ...}}
/// time-as-value: {"name": "cpu", "time": 1400620976, "data": {"user": 12, ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datapoint {
    name: String,
    timestamp: Timestamp,
    fields: Fields,
    placement: TimePlacement,
}

impl Datapoint {
    /// Assembles a datapoint.
    ///
    /// An ASCII timestamp always yields the time-as-value shape.
    pub fn new(
        name: impl Into<String>,
        timestamp: Timestamp,
        fields: Fields,
        placement: TimePlacement,
    ) -> Self {
        let placement = placement.effective(timestamp.format());
        Self {
            name: name.into(),
            timestamp,
            fields,
            placement,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn placement(&self) -> TimePlacement {
        self.placement
    }
}

impl Serialize for Datapoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.placement {
            TimePlacement::TimeAsKey => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("name", &self.name)?;
                // JSON keys are strings; the integer reads back unchanged.
                map.serialize_entry(&self.timestamp.to_string(), &self.fields)?;
                map.end()
            }
            TimePlacement::TimeAsValue => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("name", &self.name)?;
                map.serialize_entry("time", &self.timestamp)?;
                map.serialize_entry("data", &self.fields)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Fields {
        [("metric1", 1231_i64), ("metric2", 989_i64)]
            .into_iter()
            .collect()
    }

    #[test]
    fn time_as_key_uses_timestamp_as_object_key() {
        let dp = Datapoint::new(
            "my test name",
            Timestamp::Integer(1_400_620_976),
            sample_fields(),
            TimePlacement::TimeAsKey,
        );
        let json = serde_json::to_string(&dp).unwrap();

        assert_eq!(
            json,
            r#"{"name":"my test name","1400620976":{"metric1":1231,"metric2":989}}"#
        );
    }

    #[test]
    fn time_as_value_nests_data() {
        let dp = Datapoint::new(
            "cpu",
            Timestamp::Integer(7),
            sample_fields(),
            TimePlacement::TimeAsValue,
        );
        let value = serde_json::to_value(&dp).unwrap();

        assert_eq!(value["name"], "cpu");
        assert_eq!(value["time"], 7);
        assert_eq!(value["data"]["metric2"], 989);
    }

    #[test]
    fn ascii_timestamp_is_never_a_key() {
        let dp = Datapoint::new(
            "cpu",
            Timestamp::Ascii("2014-05-20 21:22:56".into()),
            sample_fields(),
            TimePlacement::TimeAsKey,
        );

        assert_eq!(dp.placement(), TimePlacement::TimeAsValue);
        let value = serde_json::to_value(&dp).unwrap();
        assert_eq!(value["time"], "2014-05-20 21:22:56");
    }
}
