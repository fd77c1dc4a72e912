//! Conversion of scalars and arrays to a declared element type.

use super::{ElementType, NdArray, Scalar};
use crate::error::WriterError;

impl Scalar {
    /// Convert to `target`, failing on out-of-range or unparsable values.
    pub fn cast(&self, target: ElementType) -> Result<Scalar, WriterError> {
        match target {
            ElementType::String => Ok(Scalar::Str(self.to_string())),
            ElementType::Bool => self.to_bool().map(Scalar::Bool),
            ElementType::Float32 => self.to_float().map(|f| Scalar::Float(f as f32 as f64)),
            ElementType::Float64 => self.to_float().map(Scalar::Float),
            int => {
                let (min, max) = int.int_bounds().unwrap_or((i64::MIN as i128, i64::MAX as i128));
                let wide = self.to_wide_int()?;
                if wide < min || wide > max {
                    return Err(WriterError::Cast(format!("{} out of range for {}", self, int)));
                }
                if min == 0 {
                    Ok(Scalar::UInt(wide as u64))
                } else {
                    Ok(Scalar::Int(wide as i64))
                }
            }
        }
    }

    fn to_bool(&self) -> Result<bool, WriterError> {
        Ok(match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::UInt(u) => *u != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Str(s) => !matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "" | "false" | "0" | "none"
            ),
        })
    }

    fn to_float(&self) -> Result<f64, WriterError> {
        match self {
            Scalar::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Ok(*i as f64),
            Scalar::UInt(u) => Ok(*u as f64),
            Scalar::Float(f) => Ok(*f),
            Scalar::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| WriterError::Cast(format!("'{}' is not a number", s))),
        }
    }

    fn to_wide_int(&self) -> Result<i128, WriterError> {
        match self {
            Scalar::Bool(b) => Ok(*b as i128),
            Scalar::Int(i) => Ok(*i as i128),
            Scalar::UInt(u) => Ok(*u as i128),
            Scalar::Float(f) => {
                if !f.is_finite() {
                    return Err(WriterError::Cast(format!("{} is not finite", f)));
                }
                Ok(f.trunc() as i128)
            }
            Scalar::Str(s) => {
                let t = s.trim();
                t.parse::<i128>().or_else(|_| {
                    t.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i128)
                        .ok_or_else(|| WriterError::Cast(format!("'{}' is not an integer", s)))
                })
            }
        }
    }
}

impl NdArray {
    /// Cast every element to `target`, keeping the shape.
    pub fn cast(&self, target: ElementType) -> Result<NdArray, WriterError> {
        let data = self
            .data()
            .iter()
            .map(|s| s.cast(target))
            .collect::<Result<Vec<_>, _>>()?;
        NdArray::new(self.shape().to_vec(), data)
    }
}
