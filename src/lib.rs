//! ptrial: sample system metrics on an interval.
//!
//! An [`Observer`] reads one [`source`] and turns each read into a
//! timestamped [`Datapoint`], encoded natively, as JSON, or as a CSV line.
//! A [`Runner`] samples an observer on a fixed interval and hands the
//! results to a bounded [`queue`], where a consumer such as a
//! [`TextRecorder`] picks them up.

pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod encode;
pub mod error;
pub mod model;
pub mod observer;
pub mod procs;
pub mod queue;
pub mod recorder;
pub mod runner;
pub mod source;

pub use encode::{Encoded, Encoder};
pub use error::{ObserverError, Result};
pub use model::{DataFormat, Datapoint, FieldValue, Fields, TimeFormat, TimePlacement, Timestamp};
pub use observer::{Observer, ObserverOptions};
pub use queue::{Consumer, Poll, Producer, handoff};
pub use recorder::TextRecorder;
pub use runner::{RunReport, RunSettings, RunState, Runner, RunnerHandle, Status};
