//! Error types surfaced by the pipeline and the tracker.
//!
//! Upstream service failures never appear here: adapters log them and hand back
//! an empty value instead. A missing snapshot is a `Comparison::NotFound` result,
//! not an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The caller passed something the pipeline cannot work with (empty topic, no keywords, ...).
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A value broke one of the data model bounds, e.g. a score outside [0, 10].
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Storage error: {0:#}")]
    Storage(#[source] anyhow::Error),

    /// Settings that cannot be turned into working adapters (bad URL, unset key variable, ...).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        PipelineError::MalformedInput(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        PipelineError::InvariantViolation(msg.into())
    }

    /// Flattens the whole context chain into the message.
    pub fn config(err: anyhow::Error) -> Self {
        PipelineError::Config(format!("{:#}", err))
    }
}
