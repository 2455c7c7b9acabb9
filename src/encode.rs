//! Encoding: turn an assembled datapoint into its wire form.
//!
//! Three forms are supported: the native [`Datapoint`] value, a JSON
//! object, and a single CSV line. CSV needs a field order; it never
//! writes its own header (see [`csv_header`]).

use serde::Serialize;

use crate::error::{ObserverError, Result};
use crate::model::{DataFormat, Datapoint};

/// A datapoint in its delivered form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Encoded {
    /// Unencoded; produced by [`DataFormat::Native`].
    Native(Datapoint),

    /// A JSON object or CSV line.
    Text(String),
}

impl Encoded {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Native(_) => None,
        }
    }

    pub fn as_datapoint(&self) -> Option<&Datapoint> {
        match self {
            Self::Native(dp) => Some(dp),
            Self::Text(_) => None,
        }
    }

    /// A single line suitable for a text sink.
    ///
    /// Text passes through untouched; native datapoints are written as JSON.
    pub fn to_line(&self) -> Result<String> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            Self::Native(dp) => Ok(serde_json::to_string(dp)?),
        }
    }
}

/// Stateless transform from [`Datapoint`] to [`Encoded`], switchable between formats.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    format: DataFormat,
    order: Option<Vec<String>>,
}

impl Encoder {
    pub fn new(format: DataFormat) -> Self {
        Self {
            format,
            order: None,
        }
    }

    /// An encoder with its CSV field order already set.
    pub fn with_order<I, S>(format: DataFormat, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut encoder = Self::new(format);
        encoder.set_order(order);
        encoder
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Change the encoding between samples.
    pub fn set_format(&mut self, format: DataFormat) {
        self.format = format;
    }

    /// Set the field order used by flat formats that omit keys.
    pub fn set_order<I, S>(&mut self, order: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        self.order = (!order.is_empty()).then_some(order);
    }

    pub fn order(&self) -> Option<&[String]> {
        self.order.as_deref()
    }

    pub fn encode(&self, datapoint: &Datapoint) -> Result<Encoded> {
        match self.format {
            DataFormat::Native => Ok(Encoded::Native(datapoint.clone())),
            DataFormat::Json => Ok(Encoded::Text(serde_json::to_string(datapoint)?)),
            DataFormat::Csv => {
                let order = self.order.as_deref().ok_or_else(|| {
                    ObserverError::Configuration(
                        "the field order must be set for CSV encoding".to_string(),
                    )
                })?;
                csv_line(datapoint, order).map(Encoded::Text)
            }
        }
    }
}

/// `timestamp,<field1>,<field2>,...`
pub fn csv_header<S: AsRef<str>>(order: &[S]) -> String {
    let mut line = String::from("timestamp");
    for name in order {
        line.push(',');
        line.push_str(name.as_ref());
    }
    line
}

/// `<timestamp>,<value1>,<value2>,...` in the given order, name omitted.
fn csv_line(datapoint: &Datapoint, order: &[String]) -> Result<String> {
    let mut line = datapoint.timestamp().to_string();
    for name in order {
        let value = datapoint
            .fields()
            .get(name)
            .ok_or_else(|| ObserverError::MissingField(name.clone()))?;
        line.push(',');
        line.push_str(&value.to_string());
    }
    Ok(line)
}
