//! Builder for creating WriterEngine instances.

use std::sync::Arc;

use crate::backend::{FileBackend, MemoryBackend};
use crate::config::{ValueScope, WriterConfig};
use crate::decoder::{CustomDecoder, DecoderPool, default_decoders};
use crate::engine::WriterEngine;
use crate::source::{CustomDataSource, DataSourcePool, DbConnector, DeviceClient, default_pool};

pub struct WriterBuilder {
    config: WriterConfig,
    backend: Arc<dyn FileBackend>,
    pool: DataSourcePool,
    decoders: DecoderPool,
    global: ValueScope,
}

impl Default for WriterBuilder {
    /// In-memory backend with every built-in source and decoder.
    fn default() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }
}

impl WriterBuilder {
    pub fn new(backend: Arc<dyn FileBackend>) -> Self {
        Self {
            config: WriterConfig::default(),
            backend,
            pool: default_pool(),
            decoders: default_decoders(),
            global: ValueScope::default(),
        }
    }

    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn with_skip_unsupported_tags(mut self, skip: bool) -> Self {
        self.config.skip_unsupported_tags = skip;
        self
    }

    pub fn with_default_can_fail(mut self, can_fail: bool) -> Self {
        self.config.default_can_fail = can_fail;
        self
    }

    /// Replace the source registry; decoders and collaborators set on this
    /// builder are still applied at build time.
    pub fn with_pool(mut self, pool: DataSourcePool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_custom_source(mut self, source: CustomDataSource) -> Self {
        self.pool.register_custom(source);
        self
    }

    pub fn with_decoders(mut self, decoders: DecoderPool) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn with_custom_decoder(mut self, decoder: CustomDecoder) -> Self {
        self.decoders.register_custom(decoder);
        self
    }

    pub fn with_device_client(mut self, client: Arc<dyn DeviceClient>) -> Self {
        self.pool = self.pool.with_device_client(client);
        self
    }

    pub fn with_database(mut self, dbtype: &str, connector: Arc<dyn DbConnector>) -> Self {
        self.pool = self.pool.with_database(dbtype, connector);
        self
    }

    pub fn with_global_scope(mut self, scope: ValueScope) -> Self {
        self.global = scope;
        self
    }

    pub fn build(self) -> WriterEngine {
        let pool = self.pool.with_decoders(self.decoders);
        let mut engine = WriterEngine::new(self.config, self.backend, pool);
        engine.set_global_scope(self.global);
        engine
    }
}
