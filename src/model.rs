//! Core data model for ptrial.
//!
//! These types describe a single sampled observation and the switches
//! that decide how it is timestamped, shaped, and encoded.

mod datapoint;
mod fields;
mod mode;

pub use datapoint::{Datapoint, Timestamp};
pub use fields::{FieldValue, Fields};
pub use mode::{DataFormat, TimeFormat, TimePlacement};
