//! Configuration types for the writer.
//!
//! This module provides:
//! - `WriterConfig`: engine-wide settings (workers, tag policy, defaults)
//! - `ValueScope`: one `{"data": ..., "triggers": ...}` value-scope
//! - `RecordContext`: the static and dynamic scopes a record is written with

mod scope;
mod settings;

pub use scope::{RecordContext, ValueScope};
pub use settings::WriterConfig;
