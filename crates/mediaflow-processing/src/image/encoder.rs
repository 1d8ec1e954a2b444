use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;

use crate::codec::{CodecError, CodecResult};

/// Decoding and WebP encoding helpers
pub struct WebpEncoder;

impl WebpEncoder {
    /// Decode any supported input format, sniffing it from the bytes.
    pub fn decode(data: &[u8]) -> CodecResult<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        if reader.format().is_none() {
            return Err(CodecError::UnsupportedFormat);
        }

        reader.decode().map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Lossy WebP at `quality` (1-100).
    pub fn encode(img: &DynamicImage, quality: u8) -> CodecResult<Bytes> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(CodecError::Encode("image has no pixels".to_string()));
        }

        let rgba = img.to_rgba8();
        let encoder = webp::Encoder::from_rgba(&rgba, width, height);
        let encoded = encoder.encode(quality.clamp(1, 100) as f32);

        Ok(Bytes::copy_from_slice(&encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 0, 0, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = WebpEncoder::decode(&png_bytes(12, 8)).unwrap();
        assert_eq!(img.dimensions(), (12, 8));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(WebpEncoder::decode(b"definitely not an image").is_err());
    }

    #[test]
    fn test_encode_produces_webp_container() {
        let img = WebpEncoder::decode(&png_bytes(32, 32)).unwrap();
        let encoded = WebpEncoder::encode(&img, 80).unwrap();
        assert_eq!(&encoded[0..4], b"RIFF");
        assert_eq!(&encoded[8..12], b"WEBP");
    }
}
