//! Rank, shape and element-type inference for nested values.

use serde_json::Value;

use super::{ElementType, NdArray, Scalar};
use crate::error::WriterError;

/// Shape of a nested JSON value.
///
/// Non-array values are scalars (empty shape). Nested arrays must be
/// rectangular.
pub fn infer_shape(value: &Value) -> Result<Vec<usize>, WriterError> {
    match value {
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return Ok(vec![0]);
            };
            let inner = infer_shape(first)?;
            for item in &items[1..] {
                let other = infer_shape(item)?;
                if other != inner {
                    return Err(WriterError::Cast(format!(
                        "ragged nested value: {:?} vs {:?}",
                        inner, other
                    )));
                }
            }
            let mut shape = Vec::with_capacity(inner.len() + 1);
            shape.push(items.len());
            shape.extend(inner);
            Ok(shape)
        }
        _ => Ok(Vec::new()),
    }
}

/// Element type covering every leaf of a nested JSON value.
pub fn infer_element_type(value: &Value) -> ElementType {
    let mut leaves = Vec::new();
    collect_types(value, &mut leaves);
    common_type(leaves.into_iter())
}

fn collect_types(value: &Value, out: &mut Vec<ElementType>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_types(v, out)),
        Value::Bool(_) => out.push(ElementType::Bool),
        Value::Number(n) if n.is_i64() => out.push(ElementType::Int64),
        Value::Number(n) if n.is_u64() => out.push(ElementType::UInt64),
        Value::Number(_) => out.push(ElementType::Float64),
        _ => out.push(ElementType::String),
    }
}

/// Smallest element type able to hold all of `types`.
pub(crate) fn common_type(types: impl Iterator<Item = ElementType>) -> ElementType {
    let mut result: Option<ElementType> = None;
    for t in types {
        result = Some(match (result, t) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(ElementType::String), _) | (_, ElementType::String) => ElementType::String,
            (Some(a), b) if a.is_float() || b.is_float() => ElementType::Float64,
            (Some(ElementType::Bool), b) => b,
            (Some(a), ElementType::Bool) => a,
            (Some(ElementType::UInt64), _) | (_, ElementType::UInt64) => ElementType::Float64,
            _ => ElementType::Int64,
        });
    }
    result.unwrap_or(ElementType::Float64)
}

pub(crate) fn flatten_json(value: &Value, out: &mut Vec<Scalar>) -> Result<(), WriterError> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_json(item, out)?;
            }
        }
        Value::Bool(b) => out.push(Scalar::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push(Scalar::Int(i));
            } else if let Some(u) = n.as_u64() {
                out.push(Scalar::UInt(u));
            } else if let Some(f) = n.as_f64() {
                out.push(Scalar::Float(f));
            }
        }
        Value::String(s) => out.push(Scalar::Str(s.clone())),
        Value::Null => {
            return Err(WriterError::Cast("null cannot be stored".to_string()));
        }
        Value::Object(_) => out.push(Scalar::Str(value.to_string())),
    }
    Ok(())
}

/// Parse inline template text into an array of the given rank.
///
/// Rank 0 takes the whole trimmed text, rank 1 splits on whitespace and
/// rank 2 reads one row per non-empty line.
pub fn parse_text(text: &str, rank: usize, dtype: ElementType) -> Result<NdArray, WriterError> {
    let leaf = |token: &str| -> Result<Scalar, WriterError> {
        Scalar::Str(token.to_string()).cast(dtype)
    };
    match rank {
        0 => {
            let trimmed = text.trim();
            Ok(NdArray::scalar(leaf(trimmed)?))
        }
        1 => {
            let items = text
                .split_whitespace()
                .map(leaf)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NdArray::vector(items))
        }
        2 => {
            let rows: Vec<Vec<Scalar>> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| {
                    l.split_whitespace()
                        .map(leaf)
                        .collect::<Result<Vec<_>, WriterError>>()
                })
                .collect::<Result<_, _>>()?;
            let cols = rows.first().map(Vec::len).unwrap_or(0);
            if rows.iter().any(|r| r.len() != cols) {
                return Err(WriterError::Cast("ragged inline image text".to_string()));
            }
            let shape = vec![rows.len(), cols];
            NdArray::new(shape, rows.into_iter().flatten().collect())
        }
        other => Err(WriterError::Unsupported(format!(
            "inline text for rank {} fields",
            other
        ))),
    }
}
