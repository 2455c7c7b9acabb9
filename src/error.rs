//! Errors raised by observers, sources, encoders, and runners.

use std::{io, path::PathBuf};

/// Errors that can occur while sampling, encoding, or running an observer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The observer or encoder was set up with unusable parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The metric source cannot be reached: missing path, no mountpoint, process gone.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source was readable but its contents did not have the expected layout.
    #[error("malformed source {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    /// A configured field is absent from the sampled data.
    #[error("field `{0}` missing from datapoint")]
    MissingField(String),

    /// `status()`, `stop()`, or `run()` was called on a runner with no handoff queue.
    #[error("no output queue attached to runner")]
    QueueNotAttached,

    /// Every consumer of the handoff queue has gone away.
    #[error("handoff queue closed by all consumers")]
    QueueClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, ObserverError>;
