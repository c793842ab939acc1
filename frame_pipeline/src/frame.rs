use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGB")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Frame has zero width or height")]
    Empty,
    #[error("Failed to encode frame: {0}")]
    EncodeFailed(#[from] image::ImageError),
}

/// A captured image: interleaved RGB8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty);
        }
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Lossy JPEG encoding. Latency matters more than fidelity here, so callers
    /// usually pass a low quality (30 by default).
    pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedImage, FrameError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode(&self.pixels, self.width, self.height, ExtendedColorType::Rgb8)?;
        Ok(EncodedImage { bytes: buf })
    }
}

/// Wire-ready image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, 128]);
            }
        }
        Frame::from_rgb(width, height, pixels).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        let err = Frame::from_rgb(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::BufferSize {
                expected: 48,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_empty_frame() {
        assert!(matches!(
            Frame::from_rgb(0, 10, vec![]),
            Err(FrameError::Empty)
        ));
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_markers() {
        let frame = gradient(16, 16);
        let encoded = frame.encode_jpeg(30).unwrap();

        let bytes = encoded.as_bytes();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_lower_quality_is_not_larger() {
        let frame = gradient(32, 32);
        let low = frame.encode_jpeg(10).unwrap();
        let high = frame.encode_jpeg(95).unwrap();
        assert!(low.len() <= high.len());
    }

    #[test]
    fn test_base64_of_encoded_image() {
        let encoded = EncodedImage::new(vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(encoded.to_base64(), "/9j/");
    }
}
