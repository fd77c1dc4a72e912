//! Element types, ranks and the n-dimensional value container.
//!
//! This module provides:
//! - `Rank`: dimensionality class of a producer value (scalar … vertex)
//! - `ElementType`: element types a backend field can be declared with
//! - `Scalar`: a single untyped element
//! - `NdArray`: a row-major block of scalars with a shape

mod cast;
mod shape;

pub use shape::{infer_element_type, infer_shape, parse_text};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dimensionality class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rank {
    Scalar,
    Spectrum,
    Image,
    Vertex,
}

impl Rank {
    /// Number of axes a value of this rank spans.
    pub fn dims(&self) -> usize {
        match self {
            Rank::Scalar => 0,
            Rank::Spectrum => 1,
            Rank::Image => 2,
            Rank::Vertex => 3,
        }
    }

    /// Rank for a value spanning `n` axes.
    pub fn from_dims(n: usize) -> Option<Self> {
        match n {
            0 => Some(Rank::Scalar),
            1 => Some(Rank::Spectrum),
            2 => Some(Rank::Image),
            3 => Some(Rank::Vertex),
            _ => None,
        }
    }

    /// Parse a rank name as used by producers and templates.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCALAR" => Some(Rank::Scalar),
            "SPECTRUM" => Some(Rank::Spectrum),
            "IMAGE" => Some(Rank::Image),
            "VERTEX" => Some(Rank::Vertex),
            _ => None,
        }
    }

    /// Envelope shape for a value with the given data extents.
    ///
    /// Scalars use the `[1, 0]` sentinel and spectra are padded to `[n, 0]`.
    pub fn envelope_shape(&self, extents: &[usize]) -> Vec<usize> {
        match self {
            Rank::Scalar => vec![1, 0],
            Rank::Spectrum => vec![extents.first().copied().unwrap_or(0), 0],
            _ => extents.to_vec(),
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Scalar => write!(f, "SCALAR"),
            Rank::Spectrum => write!(f, "SPECTRUM"),
            Rank::Image => write!(f, "IMAGE"),
            Rank::Vertex => write!(f, "VERTEX"),
        }
    }
}

/// Element type of a backend field or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
}

impl ElementType {
    /// Parse a template type name (`NX_FLOAT64`, `NX_CHAR`, ...).
    pub fn from_nexus(s: &str) -> Option<Self> {
        match s.trim() {
            "NX_CHAR" | "NX_DATE_TIME" | "ISO8601" => Some(ElementType::String),
            "NX_BOOLEAN" => Some(ElementType::Bool),
            "NX_INT" | "NX_INT64" | "NX_POSINT" => Some(ElementType::Int64),
            "NX_INT8" => Some(ElementType::Int8),
            "NX_INT16" => Some(ElementType::Int16),
            "NX_INT32" => Some(ElementType::Int32),
            "NX_UINT" | "NX_UINT64" => Some(ElementType::UInt64),
            "NX_UINT8" => Some(ElementType::UInt8),
            "NX_UINT16" => Some(ElementType::UInt16),
            "NX_UINT32" => Some(ElementType::UInt32),
            "NX_FLOAT" | "NX_FLOAT64" | "NX_NUMBER" => Some(ElementType::Float64),
            "NX_FLOAT32" => Some(ElementType::Float32),
            _ => None,
        }
    }

    /// Parse a producer-native type name.
    ///
    /// Accepts device type names (`DevDouble`, `DevLong`, ...) as well as the
    /// short element names returned by [`ElementType::name`].
    pub fn from_producer(s: &str) -> Option<Self> {
        match s.trim() {
            "DevBoolean" | "bool" => Some(ElementType::Bool),
            "DevUChar" | "uint8" => Some(ElementType::UInt8),
            "DevShort" | "int16" => Some(ElementType::Int16),
            "DevUShort" | "uint16" => Some(ElementType::UInt16),
            "DevLong" | "int32" => Some(ElementType::Int32),
            "DevULong" | "uint32" => Some(ElementType::UInt32),
            "DevLong64" | "int64" | "int" => Some(ElementType::Int64),
            "DevULong64" | "uint64" => Some(ElementType::UInt64),
            "DevFloat" | "float32" => Some(ElementType::Float32),
            "DevDouble" | "float64" | "float" => Some(ElementType::Float64),
            "int8" => Some(ElementType::Int8),
            "DevString" | "DevState" | "DevEncoded" | "string" => Some(ElementType::String),
            _ => None,
        }
    }

    /// Resolve a declared type name of either family.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_nexus(s).or_else(|| Self::from_producer(s))
    }

    /// Short element name.
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Bool => "bool",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::UInt8 => "uint8",
            ElementType::UInt16 => "uint16",
            ElementType::UInt32 => "uint32",
            ElementType::UInt64 => "uint64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::String => "string",
        }
    }

    pub fn is_integer(&self) -> bool {
        self.int_bounds().is_some()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::Float64)
    }

    /// Inclusive bounds of an integer type.
    pub(crate) fn int_bounds(&self) -> Option<(i128, i128)> {
        match self {
            ElementType::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            ElementType::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            ElementType::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            ElementType::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            ElementType::UInt8 => Some((0, u8::MAX as i128)),
            ElementType::UInt16 => Some((0, u16::MAX as i128)),
            ElementType::UInt32 => Some((0, u32::MAX as i128)),
            ElementType::UInt64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Value written in place of data a tolerated failure could not deliver.
    ///
    /// Numeric types take their maximum representable value so that readers can
    /// tell a missing reading from a genuine zero.
    pub fn sentinel(&self) -> Scalar {
        match self {
            ElementType::Bool => Scalar::Bool(false),
            ElementType::String => Scalar::Str(String::new()),
            ElementType::Float32 => Scalar::Float(f32::MAX as f64),
            ElementType::Float64 => Scalar::Float(f64::MAX),
            ElementType::UInt64 => Scalar::UInt(u64::MAX),
            other => {
                let max = other.int_bounds().map(|(_, max)| max).unwrap_or_default();
                if matches!(
                    other,
                    ElementType::UInt8 | ElementType::UInt16 | ElementType::UInt32
                ) {
                    Scalar::UInt(max as u64)
                } else {
                    Scalar::Int(max as i64)
                }
            }
        }
    }

    /// Zero value used to pad freshly grown regions.
    pub fn fill_value(&self) -> Scalar {
        match self {
            ElementType::Bool => Scalar::Bool(false),
            ElementType::String => Scalar::Str(String::new()),
            ElementType::Float32 | ElementType::Float64 => Scalar::Float(0.0),
            ElementType::UInt8 | ElementType::UInt16 | ElementType::UInt32 | ElementType::UInt64 => {
                Scalar::UInt(0)
            }
            _ => Scalar::Int(0),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single element of any supported type.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Element type this scalar carries without any cast.
    pub fn natural_type(&self) -> ElementType {
        match self {
            Scalar::Bool(_) => ElementType::Bool,
            Scalar::Int(_) => ElementType::Int64,
            Scalar::UInt(_) => ElementType::UInt64,
            Scalar::Float(_) => ElementType::Float64,
            Scalar::Str(_) => ElementType::String,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::UInt(u) => serde_json::Value::from(*u),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::UInt(u) => write!(f, "{}", u),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::UInt(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// Row-major n-dimensional block of scalars.
///
/// An empty shape denotes a single scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<Scalar>,
}

impl NdArray {
    /// Build an array, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: Vec<Scalar>) -> Result<Self, crate::WriterError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(crate::WriterError::Cast(format!(
                "{} element(s) cannot fill shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn scalar(value: impl Into<Scalar>) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value.into()],
        }
    }

    pub fn vector(values: Vec<Scalar>) -> Self {
        Self {
            shape: vec![values.len()],
            data: values,
        }
    }

    /// Array of `shape` filled with `value`.
    pub fn filled(shape: Vec<usize>, value: Scalar) -> Self {
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![value; n],
        }
    }

    /// Build an array from a (possibly nested) JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, crate::WriterError> {
        let shape = infer_shape(value)?;
        let mut data = Vec::with_capacity(shape.iter().product());
        shape::flatten_json(value, &mut data)?;
        Self::new(shape, data)
    }

    /// Nested JSON representation of the array.
    pub fn to_json(&self) -> serde_json::Value {
        fn nest(shape: &[usize], data: &[Scalar]) -> serde_json::Value {
            match shape.split_first() {
                None => data
                    .first()
                    .map(Scalar::to_json)
                    .unwrap_or(serde_json::Value::Null),
                Some((&n, rest)) => {
                    let step: usize = rest.iter().product();
                    let items = (0..n)
                        .map(|i| nest(rest, &data[i * step..(i + 1) * step]))
                        .collect();
                    serde_json::Value::Array(items)
                }
            }
        }
        nest(&self.shape, &self.data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[Scalar] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Scalar> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// First element, if any.
    pub fn first(&self) -> Option<&Scalar> {
        self.data.first()
    }

    /// Same elements viewed under another shape with the same element count.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, crate::WriterError> {
        Self::new(shape, self.data)
    }

    /// Drop axes of extent one.
    pub fn squeeze(self) -> Self {
        let shape = self.shape.iter().copied().filter(|&d| d != 1).collect();
        Self {
            shape,
            data: self.data,
        }
    }

    /// Element type covering every element of the array.
    pub fn element_type(&self) -> ElementType {
        shape::common_type(self.data.iter().map(Scalar::natural_type))
    }
}
