//! Data sources: producers of the values written into the tree.
//!
//! This module provides:
//! - `DataSource`: the contract every producer implements
//! - `DataSourcePool`: registry of sources keyed by type tag, with the shared
//!   step counter and scratch map
//! - `CustomDataSource`: closure-based sources registered at run time
//! - built-in sources: `CLIENT`, `TANGO`, `DB` and (with the `expression`
//!   feature) `PYEVAL`

mod client;
mod custom;
mod database;
mod device;
#[cfg(feature = "expression")]
mod expression;
mod group;
mod pool;

pub use client::ClientSource;
pub use custom::{CustomDataSource, SourceCall};
pub use database::{DbConnector, DbParams, DbSource, QueryFormat};
pub use device::{DeviceClient, DeviceEndpoint, DeviceMember, DeviceReading, DeviceSource, ReadingValue};
#[cfg(feature = "expression")]
pub use expression::ExpressionSource;
pub use group::{DeviceGroups, GroupCache};
pub use pool::{COUNTER_FINAL, COUNTER_INIT, DataSourcePool, default_pool};

use serde::Deserialize;

use crate::config::RecordContext;
use crate::error::WriterError;
use crate::holder::DataHolder;

/// A producer of typed values.
///
/// A source is configured once from its own `<datasource>` markup and then
/// asked for a value at every run of the element it is bound to.
pub trait DataSource: Send {
    /// Parse the source's own markup.
    fn setup(&mut self, xml: &str) -> Result<(), WriterError>;

    /// Current value, `None` when the producer has nothing to offer.
    fn get_data(&self) -> Result<Option<DataHolder>, WriterError>;

    fn is_valid(&self) -> bool {
        true
    }

    /// Install the value-scopes of the record about to be written.
    fn set_scope(&mut self, _context: &RecordContext) {}
}

/// `<record name="..."/>` child shared by several sources.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecordTag {
    #[serde(rename = "@name")]
    pub name: Option<String>,
}

impl RecordTag {
    /// The record name, or a setup error naming the source kind.
    pub(crate) fn required(tag: Option<RecordTag>, kind: &str) -> Result<String, WriterError> {
        tag.and_then(|r| r.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| WriterError::Setup(format!("{} source without a record name", kind)))
    }
}
