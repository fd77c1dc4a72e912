//! Runnable tree elements scheduled into phase pools.
//!
//! This module provides:
//! - `Element`: what the scheduler runs, checks and closes
//! - `FieldElement`: the growing-field writer
//! - `AttributeElement`, `LinkElement`: attributes and links fed by sources
//! - `layout`: slab selection for growing writes

mod attribute;
mod field;
pub mod layout;
mod link;

pub use attribute::AttributeElement;
pub use field::FieldElement;
pub use link::LinkElement;

use crate::backend::{AttributeSet, BackendError, write_string_attribute};
use crate::config::RecordContext;
use crate::error::{RunFailure, WriterError};

/// Attribute set on an object whose tolerated failure was filled.
pub const CANFAIL_STATUS: &str = "canfail_status";
/// Attribute holding the message of a tolerated failure.
pub const CANFAIL_ERROR: &str = "canfail_error";

/// A node that writes one value per run.
pub trait Element: Send {
    /// Path of the written object, used in failures and logs
    fn name(&self) -> &str;

    /// Fetch, cast and write. Failures are kept on the element.
    fn run(&mut self, context: &RecordContext);

    fn error(&self) -> Option<&RunFailure>;

    fn take_error(&mut self) -> Option<RunFailure>;

    fn can_fail(&self) -> bool;

    /// Fill the slot a failed run left empty and flag the object.
    fn mark_failed(&mut self, failure: &RunFailure) -> Result<(), WriterError>;

    /// Release backend handles.
    fn close(&mut self);
}

/// Write the degraded-object marker attributes.
pub(crate) fn write_failure_marker(
    attrs: &dyn AttributeSet,
    failure: &RunFailure,
) -> Result<(), BackendError> {
    write_string_attribute(attrs, CANFAIL_STATUS, "FAILED")?;
    write_string_attribute(attrs, CANFAIL_ERROR, &failure.to_string())
}
