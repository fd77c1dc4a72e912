//! Decoders for opaque encoded payloads.
//!
//! This module provides:
//! - `Decoder`: trait implemented by every payload decoder
//! - `DecoderPool`: registry of decoders keyed by encoding name
//! - `CustomDecoder`: closure-based decoders registered at run time
//!
//! Decoders keep the last loaded payload, so the pool hands out a fresh
//! instance per lookup.

mod custom;
mod uint32;
mod utf8;
mod video;

pub use custom::CustomDecoder;
pub use uint32::Uint32Decoder;
pub use utf8::Utf8Decoder;
pub use video::VideoImageDecoder;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::WriterError;
use crate::holder::DataHolder;
use crate::types::{ElementType, NdArray, Rank};

/// A decoder of one encoded payload format.
pub trait Decoder: Send {
    /// Encoding name this decoder is registered under
    fn name(&self) -> &str;

    /// Load a payload; `format` is the producer's format tag for it.
    fn load(&mut self, format: &str, payload: &[u8]) -> Result<(), WriterError>;

    /// Envelope shape of the loaded payload, `None` before `load`.
    fn shape(&self) -> Option<Vec<usize>>;

    /// Element type of the decoded value, `None` before `load`.
    fn dtype(&self) -> Option<ElementType>;

    /// Decode the loaded payload, `None` if nothing is loaded.
    fn decode(&mut self) -> Result<Option<NdArray>, WriterError>;
}

type DecoderFactory = Arc<dyn Fn() -> Box<dyn Decoder> + Send + Sync>;

/// Registry of decoders keyed by encoding name.
#[derive(Clone, Default)]
pub struct DecoderPool {
    factories: BTreeMap<String, DecoderFactory>,
}

impl std::fmt::Debug for DecoderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderPool")
            .field("names", &self.names())
            .finish()
    }
}

impl DecoderPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a decoder constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Decoder> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a closure-based decoder.
    ///
    /// Decoders missing any of `load`, `shape` or `decode` are rejected and the
    /// pool is left unchanged; the return value reports acceptance.
    pub fn register_custom(&mut self, decoder: CustomDecoder) -> bool {
        if !decoder.is_complete() {
            debug!(name = %decoder.name, "rejecting incomplete custom decoder");
            return false;
        }
        let name = decoder.name.clone();
        self.register(name, move || Box::new(decoder.clone()));
        true
    }

    /// Register a decoder (builder pattern).
    pub fn with_custom_decoder(mut self, decoder: CustomDecoder) -> Self {
        self.register_custom(decoder);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn has_decoder(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Fresh decoder instance for `name`.
    pub fn get(&self, name: &str) -> Option<Box<dyn Decoder>> {
        self.factories.get(name).map(|f| f())
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

    /// Decode `payload` with the decoder registered as `encoding`.
    pub fn decode(
        &self,
        encoding: &str,
        format: &str,
        payload: &[u8],
    ) -> Result<DataHolder, WriterError> {
        let mut decoder = self
            .get(encoding)
            .ok_or_else(|| WriterError::Unsupported(format!("decoder '{}'", encoding)))?;
        decoder.load(format, payload)?;
        let dtype = decoder.dtype().unwrap_or(ElementType::UInt8);
        let value = decoder.decode()?.ok_or_else(|| {
            WriterError::Decode(format!("decoder '{}' produced no value", encoding))
        })?;
        let rank = Rank::from_dims(value.ndim()).unwrap_or(Rank::Vertex);
        Ok(DataHolder::with_rank(rank, value, dtype.name())?.with_encoding(encoding))
    }
}

/// Create a pool with every built-in decoder.
pub fn default_decoders() -> DecoderPool {
    let mut pool = DecoderPool::new();
    pool.register("UTF8", || Box::new(Utf8Decoder::default()));
    pool.register("UINT32", || Box::new(Uint32Decoder::default()));
    pool.register("LIMA_VIDEO_IMAGE", || Box::new(VideoImageDecoder::default()));
    pool.register("VIDEO_IMAGE", || Box::new(VideoImageDecoder::default()));
    pool
}
