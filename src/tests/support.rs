//! Shared fixtures for engine and tree tests.

use std::sync::Arc;

use crate::backend::MemoryBackend;
use crate::builder::WriterBuilder;

pub const FILE: &str = "scan.nxs";

/// Builder writing into a fresh in-memory backend.
pub fn memory_builder() -> (MemoryBackend, WriterBuilder) {
    let backend = MemoryBackend::new();
    let builder = WriterBuilder::new(Arc::new(backend.clone()));
    (backend, builder)
}

/// `body` inside a definition holding one `entry` group.
pub fn entry_template(body: &str) -> String {
    format!(r#"<definition><group type="NXentry" name="entry">{body}</group></definition>"#)
}

/// A field fed by the `CLIENT` record `record`.
pub fn client_field(name: &str, nx_type: &str, strategy: &str, record: &str) -> String {
    format!(
        r#"<field name="{name}" type="{nx_type}">{strategy}<datasource type="CLIENT"><record name="{record}"/></datasource></field>"#
    )
}

/// One record scope as JSON, with optional triggers.
pub fn record_json(data: serde_json::Value, triggers: &[&str]) -> String {
    serde_json::json!({ "data": data, "triggers": triggers }).to_string()
}
