//! Miette integration for pretty error reporting.

use miette::{Diagnostic, Severity};
use thiserror::Error;

use super::{AggregateError, RunFailure, WriterError};

/// A diagnostic wrapper for writer errors compatible with miette.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct WriterDiagnostic {
    /// The error message
    pub message: String,

    #[source]
    /// The underlying error source
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,

    #[help]
    /// Help text for the user
    pub help: Option<String>,

    #[diagnostic(severity)]
    /// Severity level
    pub severity: Severity,
}

impl From<RunFailure> for WriterDiagnostic {
    fn from(e: RunFailure) -> Self {
        WriterDiagnostic {
            message: format!("[{}] on '{}'", e.stage, e.element),
            source: Some(e.error),
            help: Some("Check the data source bound to this element or mark it canfail".into()),
            severity: Severity::Error,
        }
    }
}

impl From<AggregateError> for WriterDiagnostic {
    fn from(agg: AggregateError) -> Self {
        let count = agg.errors.len();
        let pool = agg.pool.clone();
        match agg.errors.into_iter().next() {
            Some(first) => {
                let mut diag = WriterDiagnostic::from(first);
                if count > 1 {
                    diag.message = format!("{} (and {} more in pool '{}')", diag.message, count - 1, pool);
                }
                diag
            }
            None => WriterDiagnostic {
                message: format!("Unknown failure in pool '{}'", pool),
                source: None,
                help: None,
                severity: Severity::Error,
            },
        }
    }
}

impl From<WriterError> for WriterDiagnostic {
    fn from(e: WriterError) -> Self {
        let help = match &e {
            WriterError::Setup(_) | WriterError::Markup(_) => {
                Some("Check the template markup and data-source configuration".to_string())
            }
            WriterError::Shape { .. } => {
                Some("Declare <dimensions> for the field or bind a source with a value".to_string())
            }
            WriterError::Unsupported(_) => {
                Some("Enable skip_unsupported_tags or register the missing backend".to_string())
            }
            _ => None,
        };
        match e {
            WriterError::Aggregate(agg) => WriterDiagnostic::from(agg),
            other => WriterDiagnostic {
                message: other.to_string(),
                source: Some(Box::new(other)),
                help,
                severity: Severity::Error,
            },
        }
    }
}

impl From<WriterError> for miette::Report {
    fn from(e: WriterError) -> Self {
        miette::Report::new(WriterDiagnostic::from(e))
    }
}
