//! Little-endian `u32` array payloads.

use super::Decoder;
use crate::error::WriterError;
use crate::types::{ElementType, NdArray, Scalar};

/// Decodes a payload of packed little-endian `u32` values into a spectrum.
#[derive(Debug, Default, Clone)]
pub struct Uint32Decoder {
    payload: Option<Vec<u8>>,
}

impl Decoder for Uint32Decoder {
    fn name(&self) -> &str {
        "UINT32"
    }

    fn load(&mut self, _format: &str, payload: &[u8]) -> Result<(), WriterError> {
        if payload.len() % 4 != 0 {
            return Err(WriterError::Decode(format!(
                "UINT32 payload of {} byte(s) is not a multiple of 4",
                payload.len()
            )));
        }
        self.payload = Some(payload.to_vec());
        Ok(())
    }

    fn shape(&self) -> Option<Vec<usize>> {
        self.payload.as_ref().map(|p| vec![p.len() / 4, 0])
    }

    fn dtype(&self) -> Option<ElementType> {
        self.payload.as_ref().map(|_| ElementType::UInt32)
    }

    fn decode(&mut self) -> Result<Option<NdArray>, WriterError> {
        let Some(bytes) = self.payload.as_ref() else {
            return Ok(None);
        };
        let values = bytes
            .chunks_exact(4)
            .map(|c| Scalar::UInt(u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as u64))
            .collect();
        Ok(Some(NdArray::vector(values)))
    }
}
