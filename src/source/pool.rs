//! Registry of data sources keyed by type tag.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::database::{DbConnector, DbSource};
use super::device::{DeviceClient, DeviceSource};
use super::{ClientSource, CustomDataSource, DataSource};
use crate::decoder::{DecoderPool, default_decoders};
use crate::error::WriterError;

/// Step counter value while the INIT pool runs.
pub const COUNTER_INIT: i64 = -1;
/// Step counter value while the FINAL pool runs.
pub const COUNTER_FINAL: i64 = -2;

type SourceFactory = Arc<dyn Fn(&DataSourcePool) -> Box<dyn DataSource> + Send + Sync>;
type ScratchValue = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Shared {
    counter: i64,
    scratch: HashMap<String, ScratchValue>,
}

/// Source registry plus the state sources coordinate through.
///
/// Clones share the step counter and scratch map.
#[derive(Clone)]
pub struct DataSourcePool {
    factories: BTreeMap<String, SourceFactory>,
    shared: Arc<Mutex<Shared>>,
    decoders: Arc<DecoderPool>,
    device_client: Option<Arc<dyn DeviceClient>>,
    databases: BTreeMap<String, Arc<dyn DbConnector>>,
}

impl std::fmt::Debug for DataSourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourcePool")
            .field("sources", &self.names())
            .field("counter", &self.counter())
            .field("decoders", &self.decoders)
            .field("has_device_client", &self.device_client.is_some())
            .field("databases", &self.databases.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for DataSourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSourcePool {
    /// Create an empty pool with the built-in decoders.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            shared: Arc::new(Mutex::new(Shared::default())),
            decoders: Arc::new(default_decoders()),
            device_client: None,
            databases: BTreeMap::new(),
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a source constructor under `tag`, replacing any previous one.
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn(&DataSourcePool) -> Box<dyn DataSource> + Send + Sync + 'static,
    {
        self.factories.insert(tag.into(), Arc::new(factory));
    }

    /// Register a closure-based source.
    ///
    /// Sources missing any of `setup`, `get_data` or `is_valid` are rejected
    /// and the pool is left unchanged; the return value reports acceptance.
    pub fn register_custom(&mut self, source: CustomDataSource) -> bool {
        if !source.is_complete() {
            debug!(name = %source.name, "rejecting incomplete custom source");
            return false;
        }
        let tag = source.name.clone();
        self.register(tag, move |_| Box::new(source.clone()));
        true
    }

    /// Register a source (builder pattern).
    pub fn with_custom_source(mut self, source: CustomDataSource) -> Self {
        self.register_custom(source);
        self
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        self.factories.remove(tag).is_some()
    }

    pub fn has_source(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Fresh, not yet set up, source for `tag`.
    pub fn create(&self, tag: &str) -> Result<Box<dyn DataSource>, WriterError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| WriterError::Unsupported(format!("data source type '{}'", tag)))?;
        Ok(factory(self))
    }

    /// Create a source for `tag` and set it up from `xml`.
    pub fn build(&self, tag: &str, xml: &str) -> Result<Box<dyn DataSource>, WriterError> {
        let mut source = self.create(tag)?;
        source.setup(xml)?;
        Ok(source)
    }

    /// Current step counter: `-1` during INIT, `-2` during FINAL, `1..` per step.
    pub fn counter(&self) -> i64 {
        self.shared().counter
    }

    pub fn set_counter(&self, counter: i64) {
        self.shared().counter = counter;
    }

    /// Shared scratch value stored under `key`, created on first use.
    pub fn scratch_entry<T>(&self, key: &str) -> Result<Arc<T>, WriterError>
    where
        T: Any + Send + Sync + Default,
    {
        let mut shared = self.shared();
        let entry = shared
            .scratch
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(T::default()) as ScratchValue)
            .clone();
        entry.downcast::<T>().map_err(|_| {
            WriterError::State(format!("scratch entry '{}' holds another type", key))
        })
    }

    /// Drop every scratch value.
    pub fn clear_scratch(&self) {
        self.shared().scratch.clear();
    }

    pub fn decoders(&self) -> &DecoderPool {
        &self.decoders
    }

    pub fn with_decoders(mut self, decoders: DecoderPool) -> Self {
        self.decoders = Arc::new(decoders);
        self
    }

    pub fn device_client(&self) -> Option<Arc<dyn DeviceClient>> {
        self.device_client.clone()
    }

    pub fn with_device_client(mut self, client: Arc<dyn DeviceClient>) -> Self {
        self.device_client = Some(client);
        self
    }

    /// Connector for database type `dbtype` (case-insensitive).
    pub fn database(&self, dbtype: &str) -> Option<Arc<dyn DbConnector>> {
        self.databases.get(&dbtype.to_ascii_uppercase()).cloned()
    }

    pub fn with_database(mut self, dbtype: &str, connector: Arc<dyn DbConnector>) -> Self {
        self.databases.insert(dbtype.to_ascii_uppercase(), connector);
        self
    }
}

/// Create a pool with every built-in source.
pub fn default_pool() -> DataSourcePool {
    let mut pool = DataSourcePool::new();
    pool.register("CLIENT", |_| Box::new(ClientSource::default()));
    pool.register("TANGO", |p| Box::new(DeviceSource::new(p.clone())));
    pool.register("DB", |p| Box::new(DbSource::new(p.clone())));
    #[cfg(feature = "expression")]
    pool.register("PYEVAL", |p| Box::new(super::ExpressionSource::new(p.clone())));
    pool
}
