// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding of annotated scan images
//!
//! Encoding runs on the blocking pool in the async path.

use crate::constants::annotation;
use crate::errors::StorageError;
use image::RgbImage;
use tracing::{debug, info};

/// Encoded image data ready for saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Encode an RGB image as JPEG
///
/// `quality` is clamped to 1..=100.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, StorageError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| StorageError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}

/// Scan image encoder
#[derive(Debug, Clone, Copy)]
pub struct ResultEncoder {
    quality: u8,
}

impl Default for ResultEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultEncoder {
    /// Encoder at the default scan result quality
    pub fn new() -> Self {
        Self {
            quality: annotation::JPEG_QUALITY,
        }
    }

    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode_blocking(&self, image: &RgbImage) -> Result<EncodedImage, StorageError> {
        let data = encode_jpeg(image, self.quality)?;
        debug!(size = data.len(), quality = self.quality, "Encoding complete");
        Ok(EncodedImage {
            data,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Encode on the blocking pool
    pub async fn encode(&self, image: RgbImage) -> Result<EncodedImage, StorageError> {
        info!(
            width = image.width(),
            height = image.height(),
            quality = self.quality,
            "Starting encoding"
        );

        let encoder = *self;
        tokio::task::spawn_blocking(move || encoder.encode_blocking(&image))
            .await
            .map_err(|e| StorageError::EncodingFailed(format!("encoding task error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]))
    }

    #[test]
    fn test_encode_jpeg_roundtrip_dimensions() {
        let data = encode_jpeg(&gradient(), 95).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_quality_affects_size() {
        let image = RgbImage::from_fn(128, 128, |x, y| {
            Rgb([((x * 7) ^ (y * 13)) as u8, (x * y) as u8, (x + y) as u8])
        });
        let low = encode_jpeg(&image, 10).unwrap();
        let high = encode_jpeg(&image, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(ResultEncoder::with_quality(0).quality(), 1);
        assert_eq!(ResultEncoder::with_quality(200).quality(), 100);
        assert_eq!(ResultEncoder::new().quality(), 95);
    }

    #[tokio::test]
    async fn test_async_encode() {
        let encoded = ResultEncoder::new().encode(gradient()).await.unwrap();
        assert_eq!((encoded.width, encoded.height), (64, 48));
        assert!(!encoded.data.is_empty());
    }
}
