//! UTF-8 string payloads.

use super::Decoder;
use crate::error::WriterError;
use crate::types::{ElementType, NdArray};

/// Decodes the payload bytes as one UTF-8 string.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    format: Option<String>,
    payload: Option<Vec<u8>>,
}

impl Utf8Decoder {
    /// Format tag of the loaded payload.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

impl Decoder for Utf8Decoder {
    fn name(&self) -> &str {
        "UTF8"
    }

    fn load(&mut self, format: &str, payload: &[u8]) -> Result<(), WriterError> {
        self.format = Some(format.to_string());
        self.payload = Some(payload.to_vec());
        Ok(())
    }

    fn shape(&self) -> Option<Vec<usize>> {
        self.payload.as_ref().map(|_| vec![1, 0])
    }

    fn dtype(&self) -> Option<ElementType> {
        self.payload.as_ref().map(|_| ElementType::String)
    }

    fn decode(&mut self) -> Result<Option<NdArray>, WriterError> {
        let Some(bytes) = self.payload.as_ref() else {
            return Ok(None);
        };
        let text = std::str::from_utf8(bytes).map_err(|e| WriterError::Decode(e.to_string()))?;
        Ok(Some(NdArray::scalar(text)))
    }
}
