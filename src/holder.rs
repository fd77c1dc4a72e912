//! The value envelope every data source returns.

use crate::error::WriterError;
use crate::types::{ElementType, NdArray, Rank, infer_element_type};

/// Uniform carrier of one producer value.
///
/// `shape` follows the envelope convention: `[1, 0]` for scalars, `[n, 0]`
/// for spectra and the full extents otherwise. Use [`DataHolder::extents`] for
/// the real data extents.
#[derive(Debug, Clone, PartialEq)]
pub struct DataHolder {
    pub rank: Rank,
    pub value: NdArray,
    /// Producer-native type name (`DevDouble`, `float64`, ...)
    pub declared_type: String,
    pub shape: Vec<usize>,
    /// Encoding of an opaque payload, when the value came from a decoder
    pub encoding: Option<String>,
}

impl DataHolder {
    /// Wrap an array, deriving rank and envelope shape from its extents.
    pub fn new(value: NdArray, declared_type: impl Into<String>) -> Result<Self, WriterError> {
        let rank = Rank::from_dims(value.ndim()).ok_or_else(|| {
            WriterError::Unsupported(format!("values with {} axes", value.ndim()))
        })?;
        let shape = rank.envelope_shape(value.shape());
        Ok(Self {
            rank,
            value,
            declared_type: declared_type.into(),
            shape,
            encoding: None,
        })
    }

    /// Wrap an array whose producer declared an explicit rank.
    ///
    /// A spectrum of one element reported as a scalar is accepted and unwrapped.
    pub fn with_rank(
        rank: Rank,
        value: NdArray,
        declared_type: impl Into<String>,
    ) -> Result<Self, WriterError> {
        let value = if rank == Rank::Scalar && value.ndim() == 1 && value.len() == 1 {
            value.reshape(Vec::new())?
        } else {
            value
        };
        if value.ndim() != rank.dims() {
            return Err(WriterError::Cast(format!(
                "{} declared for a value with shape {:?}",
                rank,
                value.shape()
            )));
        }
        let shape = rank.envelope_shape(value.shape());
        Ok(Self {
            rank,
            value,
            declared_type: declared_type.into(),
            shape,
            encoding: None,
        })
    }

    /// Build a holder from a nested JSON value, inferring rank, shape and type.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, WriterError> {
        let dtype = infer_element_type(value);
        let array = NdArray::from_json(value)?;
        Self::new(array, dtype.name())
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Real data extents, without the scalar/spectrum padding.
    pub fn extents(&self) -> &[usize] {
        self.value.shape()
    }

    /// Element type matching the declared producer type, if it is known.
    pub fn element_type(&self) -> ElementType {
        ElementType::parse(&self.declared_type).unwrap_or_else(|| self.value.element_type())
    }

    /// Value converted to `target`.
    pub fn cast(&self, target: ElementType) -> Result<NdArray, WriterError> {
        self.value.cast(target)
    }
}
