//! Observer: sample a source, stamp it, shape it, encode it.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::Clock;
use crate::encode::{Encoded, Encoder, csv_header};
use crate::error::{ObserverError, Result};
use crate::model::{DataFormat, Datapoint, TimeFormat, TimePlacement};
use crate::source::Source;

/// How an observer stamps, shapes, and encodes its datapoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObserverOptions {
    pub time_format: TimeFormat,
    pub data_format: DataFormat,
    pub placement: TimePlacement,
}

/// Column names an external consumer writes before any data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldHeader<'a> {
    /// CSV mode: `timestamp,<field1>,<field2>,...`.
    Line(String),

    /// Any other mode: the field names in canonical order.
    Names(&'a [&'static str]),
}

/// A named observer of one metric source.
///
/// Identity and time handling are fixed at construction. The data format
/// may be changed between samples, never during one.
pub struct Observer {
    name: String,
    source: Box<dyn Source>,
    clock: Clock,
    placement: TimePlacement,
    encoder: Encoder,
    last: Option<Datapoint>,
}

impl Observer {
    /// Integer time, native data, time as key.
    pub fn new(name: impl Into<String>, source: impl Source + 'static) -> Result<Self> {
        Self::with_options(name, source, ObserverOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        source: impl Source + 'static,
        options: ObserverOptions,
    ) -> Result<Self> {
        Self::from_boxed(name, Box::new(source), options)
    }

    /// Build from a source chosen at runtime.
    pub fn from_boxed(
        name: impl Into<String>,
        source: Box<dyn Source>,
        options: ObserverOptions,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObserverError::Configuration(
                "an observer must have a name".to_string(),
            ));
        }

        let encoder = Encoder::with_order(options.data_format, source.field_names().iter().copied());

        Ok(Self {
            name,
            clock: Clock::new(options.time_format),
            placement: options.placement.effective(options.time_format),
            encoder,
            source,
            last: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time_format(&self) -> TimeFormat {
        self.clock.format()
    }

    pub fn data_format(&self) -> DataFormat {
        self.encoder.format()
    }

    /// Switch encodings between samples.
    pub fn set_data_format(&mut self, format: DataFormat) {
        self.encoder.set_format(format);
    }

    pub fn placement(&self) -> TimePlacement {
        self.placement
    }

    pub fn source_kind(&self) -> &'static str {
        self.source.kind()
    }

    pub fn field_names(&self) -> &[&'static str] {
        self.source.field_names()
    }

    /// The datapoint assembled by the most recent successful read.
    pub fn last_datapoint(&self) -> Option<&Datapoint> {
        self.last.as_ref()
    }

    /// Read the source once, stamp it once, and encode the result.
    ///
    /// A failed read leaves [`Observer::last_datapoint`] untouched.
    pub fn sample(&mut self) -> Result<Encoded> {
        let fields = self.source.read()?;
        let timestamp = self.clock.now();
        let datapoint = Datapoint::new(self.name.clone(), timestamp, fields, self.placement);

        trace!(observer = %self.name, timestamp = %datapoint.timestamp(), "sampled");

        let encoded = self.encoder.encode(&datapoint);
        self.last = Some(datapoint);
        encoded
    }

    pub fn field_header(&self) -> FieldHeader<'_> {
        match self.data_format() {
            DataFormat::Csv => FieldHeader::Line(csv_header(self.field_names())),
            DataFormat::Native | DataFormat::Json => FieldHeader::Names(self.field_names()),
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("name", &self.name)
            .field("source", &self.source.kind())
            .field("time_format", &self.time_format())
            .field("data_format", &self.data_format())
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}
