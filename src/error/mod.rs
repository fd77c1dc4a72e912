//! Error types and failure aggregation for the writer.
//!
//! This module provides:
//! - `WriterError`: the error taxonomy (setup, shape, unsupported, run-time, ...)
//! - `Stage`: where inside an element run a failure happened
//! - `RunFailure`: a single failed element with context
//! - `AggregateError`: every fatal failure of one pool, raised together

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised while building, scheduling or writing a tree.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Malformed or incomplete template or data-source configuration
    #[error("setup error: {0}")]
    Setup(String),

    /// A field shape cannot be determined or does not fit the observed data
    #[error("shape error in '{field}': {message}")]
    Shape { field: String, message: String },

    /// Unknown markup tag or unavailable producer backend
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The template markup itself could not be parsed
    #[error("markup error: {0}")]
    Markup(String),

    /// A producer failed to deliver a value
    #[error("source error: {0}")]
    Source(String),

    /// A value could not be converted to the requested element type
    #[error("cast error: {0}")]
    Cast(String),

    /// An encoded payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Record value-scope could not be parsed
    #[error("scope error: {0}")]
    Scope(String),

    /// Writer configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),

    /// The engine was driven out of its open/record/close order
    #[error("state error: {0}")]
    State(String),

    /// Error reported by the file-tree backend
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// I/O error while reading templates or configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more elements of a pool failed
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl WriterError {
    /// Shorthand for a shape error naming `field`.
    pub fn shape(field: impl Into<String>, message: impl Into<String>) -> Self {
        WriterError::Shape {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for WriterError {
    fn from(e: quick_xml::Error) -> Self {
        WriterError::Markup(e.to_string())
    }
}

impl From<quick_xml::DeError> for WriterError {
    fn from(e: quick_xml::DeError) -> Self {
        WriterError::Setup(e.to_string())
    }
}

/// Step of an element run that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetching the value from the bound data source
    Fetch,
    /// Casting the value to the declared element type
    Cast,
    /// Growing or writing the backend object
    Write,
    /// Filling a tolerated failure with the sentinel value
    Fill,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "Fetch"),
            Stage::Cast => write!(f, "Cast"),
            Stage::Write => write!(f, "Write"),
            Stage::Fill => write!(f, "Fill"),
        }
    }
}

#[derive(Debug)]
pub struct RunFailure {
    /// Stage where the error occurred
    pub stage: Stage,
    /// Path of the failed element inside the file tree
    pub element: String,
    /// The underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl RunFailure {
    pub fn new(stage: Stage, element: impl Into<String>, error: WriterError) -> Self {
        Self {
            stage,
            element: element.into(),
            error: Box::new(error),
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.element, self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// All fatal failures collected from one pool run.
#[derive(Debug, Error)]
pub struct AggregateError {
    /// Name of the pool that produced the failures
    pub pool: String,
    /// Collection of individual failures
    pub errors: Vec<RunFailure>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pool '{}' encountered {} error(s):",
            self.pool,
            self.errors.len()
        )?;
        for (i, e) in self.errors.iter().enumerate() {
            writeln!(f, "  #{}: {}", i + 1, e)?;
        }
        Ok(())
    }
}

impl AggregateError {
    /// Create a new aggregate error with a single failure.
    pub fn single(pool: impl Into<String>, error: RunFailure) -> Self {
        Self {
            pool: pool.into(),
            errors: vec![error],
        }
    }

    /// Check if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Paths of every failed element, in scan order.
    pub fn elements(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.element.as_str()).collect()
    }
}

#[cfg(feature = "miette")]
mod miette_impl;

#[cfg(feature = "miette")]
pub use miette_impl::*;
