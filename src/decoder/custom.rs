//! Closure-based decoders registered at run time.

use std::sync::Arc;

use super::Decoder;
use crate::error::WriterError;
use crate::types::{ElementType, NdArray};

pub type LoadFn = Arc<dyn Fn(&str, &[u8]) -> Result<(), WriterError> + Send + Sync>;
pub type ShapeFn = Arc<dyn Fn(&[u8]) -> Vec<usize> + Send + Sync>;
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<NdArray, WriterError> + Send + Sync>;

/// A user-defined decoder assembled from closures.
///
/// # Example
///
/// ```rust,ignore
/// use nexwrite::decoder::{CustomDecoder, DecoderPool};
///
/// let mut pool = DecoderPool::new();
/// let accepted = pool.register_custom(
///     CustomDecoder::new("BYTES", ElementType::UInt8)
///         .with_load(|_format, _bytes| Ok(()))
///         .with_shape(|bytes| vec![bytes.len(), 0])
///         .with_decode(|bytes| Ok(NdArray::vector(bytes.iter().map(|b| (*b as u64).into()).collect()))),
/// );
/// assert!(accepted);
/// ```
#[derive(Clone)]
pub struct CustomDecoder {
    pub name: String,
    pub dtype: ElementType,
    pub load_fn: Option<LoadFn>,
    pub shape_fn: Option<ShapeFn>,
    pub decode_fn: Option<DecodeFn>,
    payload: Option<Vec<u8>>,
}

impl std::fmt::Debug for CustomDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomDecoder")
            .field("name", &self.name)
            .field("dtype", &self.dtype)
            .field("has_load", &self.load_fn.is_some())
            .field("has_shape", &self.shape_fn.is_some())
            .field("has_decode", &self.decode_fn.is_some())
            .finish()
    }
}

impl CustomDecoder {
    pub fn new(name: impl Into<String>, dtype: ElementType) -> Self {
        Self {
            name: name.into(),
            dtype,
            load_fn: None,
            shape_fn: None,
            decode_fn: None,
            payload: None,
        }
    }

    pub fn with_load<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[u8]) -> Result<(), WriterError> + Send + Sync + 'static,
    {
        self.load_fn = Some(Arc::new(f));
        self
    }

    pub fn with_shape<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<usize> + Send + Sync + 'static,
    {
        self.shape_fn = Some(Arc::new(f));
        self
    }

    pub fn with_decode<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) -> Result<NdArray, WriterError> + Send + Sync + 'static,
    {
        self.decode_fn = Some(Arc::new(f));
        self
    }

    /// Whether every capability a decoder must offer is present.
    pub fn is_complete(&self) -> bool {
        self.load_fn.is_some() && self.shape_fn.is_some() && self.decode_fn.is_some()
    }

    fn missing(&self, what: &str) -> WriterError {
        WriterError::Unsupported(format!("custom decoder '{}' has no {}", self.name, what))
    }
}

impl Decoder for CustomDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, format: &str, payload: &[u8]) -> Result<(), WriterError> {
        let load = self.load_fn.as_ref().ok_or_else(|| self.missing("load"))?;
        load(format, payload)?;
        self.payload = Some(payload.to_vec());
        Ok(())
    }

    fn shape(&self) -> Option<Vec<usize>> {
        match (&self.shape_fn, &self.payload) {
            (Some(f), Some(p)) => Some(f(p)),
            _ => None,
        }
    }

    fn dtype(&self) -> Option<ElementType> {
        self.payload.as_ref().map(|_| self.dtype)
    }

    fn decode(&mut self) -> Result<Option<NdArray>, WriterError> {
        let decode = self.decode_fn.as_ref().ok_or_else(|| self.missing("decode"))?;
        match &self.payload {
            Some(p) => decode(p).map(Some),
            None => Ok(None),
        }
    }
}
