//! Record value-scopes.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::WriterError;

/// One value-scope: named values plus the trigger pools it fires.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValueScope {
    pub data: Map<String, Value>,
    pub triggers: Vec<String>,
}

impl ValueScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a scope from its JSON text; empty text is an empty scope.
    pub fn from_json_str(s: &str) -> Result<Self, WriterError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(s).map_err(|e| WriterError::Scope(e.to_string()))
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Static (per entry) and dynamic (per record) scopes seen by data sources.
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    pub global: Arc<ValueScope>,
    pub local: Arc<ValueScope>,
}

impl RecordContext {
    /// Context with only the static scope, as used during INIT and FINAL.
    pub fn global_only(global: Arc<ValueScope>) -> Self {
        Self {
            global,
            local: Arc::new(ValueScope::default()),
        }
    }

    pub fn new(global: Arc<ValueScope>, local: Arc<ValueScope>) -> Self {
        Self { global, local }
    }

    /// Look `key` up in the dynamic scope first, then the static one.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.local.get(key).or_else(|| self.global.get(key))
    }

    /// Trigger pools the current record fires.
    pub fn triggers(&self) -> &[String] {
        &self.local.triggers
    }
}
