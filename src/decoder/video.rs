//! Fixed-header video image payloads.

use super::Decoder;
use crate::error::WriterError;
use crate::types::{ElementType, NdArray, Scalar};

/// Size of the big-endian header preceding the pixel data.
pub const HEADER_SIZE: usize = 32;

/// Parsed image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub version: u16,
    /// Pixel width selector: 0 → u8, 1 → u16, 2 → u32, 3 → u64
    pub image_mode: u16,
    pub frame_number: i64,
    pub width: usize,
    pub height: usize,
    /// 0 for little-endian pixel data, anything else for big-endian
    pub endianness: u16,
    pub header_size: u16,
}

impl ImageHeader {
    /// Parse the 32-byte `!IHHqiiHHHH` header.
    pub fn parse(bytes: &[u8]) -> Result<Self, WriterError> {
        if bytes.len() < HEADER_SIZE {
            return Err(WriterError::Decode(format!(
                "image payload of {} byte(s) is shorter than its header",
                bytes.len()
            )));
        }
        let u16_at = |o: usize| u16::from_be_bytes([bytes[o], bytes[o + 1]]);
        let i32_at = |o: usize| i32::from_be_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
        let mut frame = [0u8; 8];
        frame.copy_from_slice(&bytes[8..16]);
        let width = i32_at(16);
        let height = i32_at(20);
        if width < 0 || height < 0 {
            return Err(WriterError::Decode(format!(
                "negative image size {}x{}",
                width, height
            )));
        }
        Ok(Self {
            magic: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            version: u16_at(4),
            image_mode: u16_at(6),
            frame_number: i64::from_be_bytes(frame),
            width: width as usize,
            height: height as usize,
            endianness: u16_at(24),
            header_size: u16_at(26),
        })
    }

    fn pixel(&self) -> Result<(usize, ElementType), WriterError> {
        match self.image_mode {
            0 => Ok((1, ElementType::UInt8)),
            1 => Ok((2, ElementType::UInt16)),
            2 => Ok((4, ElementType::UInt32)),
            3 => Ok((8, ElementType::UInt64)),
            other => Err(WriterError::Decode(format!("unknown image mode {}", other))),
        }
    }
}

/// Decodes a header-prefixed image into a `[height, width]` array.
#[derive(Debug, Default, Clone)]
pub struct VideoImageDecoder {
    header: Option<ImageHeader>,
    payload: Option<Vec<u8>>,
}

impl VideoImageDecoder {
    pub fn header(&self) -> Option<&ImageHeader> {
        self.header.as_ref()
    }
}

impl Decoder for VideoImageDecoder {
    fn name(&self) -> &str {
        "LIMA_VIDEO_IMAGE"
    }

    fn load(&mut self, _format: &str, payload: &[u8]) -> Result<(), WriterError> {
        let header = ImageHeader::parse(payload)?;
        header.pixel()?;
        self.header = Some(header);
        self.payload = Some(payload.to_vec());
        Ok(())
    }

    fn shape(&self) -> Option<Vec<usize>> {
        self.header.map(|h| vec![h.height, h.width])
    }

    fn dtype(&self) -> Option<ElementType> {
        self.header.and_then(|h| h.pixel().ok()).map(|(_, t)| t)
    }

    fn decode(&mut self) -> Result<Option<NdArray>, WriterError> {
        let (Some(header), Some(payload)) = (self.header, self.payload.as_ref()) else {
            return Ok(None);
        };
        let (size, _) = header.pixel()?;
        let image = &payload[HEADER_SIZE..];
        let needed = header
            .width
            .checked_mul(header.height)
            .and_then(|count| count.checked_mul(size))
            .ok_or_else(|| {
                WriterError::Decode(format!(
                    "image {}x{} is too large to address",
                    header.height, header.width
                ))
            })?;
        if image.len() < needed {
            return Err(WriterError::Decode(format!(
                "image {}x{} needs {} byte(s), payload has {}",
                header.height,
                header.width,
                needed,
                image.len()
            )));
        }
        let little = header.endianness == 0;
        let pixels = image[..needed]
            .chunks_exact(size)
            .map(|c| {
                let mut buf = [0u8; 8];
                if little {
                    buf[..size].copy_from_slice(c);
                    Scalar::UInt(u64::from_le_bytes(buf))
                } else {
                    buf[8 - size..].copy_from_slice(c);
                    Scalar::UInt(u64::from_be_bytes(buf))
                }
            })
            .collect();
        NdArray::new(vec![header.height, header.width], pixels).map(Some)
    }
}
