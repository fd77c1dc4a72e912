//! Values pushed by the acquisition client through the record scopes.

use serde::Deserialize;

use super::{DataSource, RecordTag};
use crate::config::RecordContext;
use crate::error::WriterError;
use crate::holder::DataHolder;

#[derive(Debug, Default, Deserialize)]
struct ClientMarkup {
    record: Option<RecordTag>,
}

/// `CLIENT` source: looks its record name up in the local, then global scope.
#[derive(Debug, Default, Clone)]
pub struct ClientSource {
    record: String,
    context: RecordContext,
}

impl ClientSource {
    pub fn new(record: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            context: RecordContext::default(),
        }
    }

    pub fn record(&self) -> &str {
        &self.record
    }
}

impl DataSource for ClientSource {
    fn setup(&mut self, xml: &str) -> Result<(), WriterError> {
        let markup: ClientMarkup = quick_xml::de::from_str(xml)?;
        self.record = RecordTag::required(markup.record, "CLIENT")?;
        Ok(())
    }

    fn get_data(&self) -> Result<Option<DataHolder>, WriterError> {
        match self.context.lookup(&self.record) {
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(value) => DataHolder::from_json(value).map(Some),
        }
    }

    fn set_scope(&mut self, context: &RecordContext) {
        self.context = context.clone();
    }
}
