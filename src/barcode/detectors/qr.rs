// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection
//!
//! Uses the rqrr crate to locate QR grids in a grayscale image and decode
//! them. The four grid corners become the barcode's corner points and its
//! bounding box.

use super::BarcodeDetector;
use crate::barcode::types::{Barcode, BarcodeFormat, Point};
use crate::errors::DetectionError;
use image::GrayImage;
use tracing::{debug, trace};

/// QR code detector
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDetector;

impl QrDetector {
    pub fn new() -> Self {
        Self
    }
}

impl BarcodeDetector for QrDetector {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn formats(&self) -> &[BarcodeFormat] {
        &[BarcodeFormat::QrCode]
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Barcode>, DetectionError> {
        let start = std::time::Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                image.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();
        trace!(grids = grids.len(), "QR grids located");

        let mut barcodes = Vec::with_capacity(grids.len());
        for grid in grids {
            let content = match grid.decode() {
                Ok((_meta, content)) => content,
                Err(e) => {
                    debug!(error = %e, "Failed to decode QR grid");
                    continue;
                }
            };

            let corners: Vec<Point> = grid
                .bounds
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect();
            let barcode = Barcode::new(BarcodeFormat::QrCode, content).with_corner_points(corners);

            debug!(
                content = %barcode.raw_value,
                bounds = ?barcode.bounding_box,
                "Detected QR code"
            );
            barcodes.push(barcode);
        }

        trace!(
            count = barcodes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "QR detection complete"
        );
        Ok(barcodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    const MODULE_PX: u32 = 4;
    const QUIET_MODULES: u32 = 4;

    /// Render a QR symbol with a 4-module quiet zone, returning the image
    /// and the symbol's side length in pixels
    fn render_qr(content: &str) -> (GrayImage, u32) {
        let code = qrcode::QrCode::new(content.as_bytes()).unwrap();
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET_MODULES) * MODULE_PX;
        let image = GrayImage::from_fn(side, side, |x, y| {
            let mx = (x / MODULE_PX) as i64 - QUIET_MODULES as i64;
            let my = (y / MODULE_PX) as i64 - QUIET_MODULES as i64;
            let inside = (0..modules as i64).contains(&mx) && (0..modules as i64).contains(&my);
            if inside && colors[(my * modules as i64 + mx) as usize] == qrcode::Color::Dark {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        (image, modules * MODULE_PX)
    }

    #[test]
    fn test_decodes_qr_symbol_with_bounds() {
        let content = "https://example.com/item/5901234123457";
        let (image, symbol_px) = render_qr(content);

        let barcodes = QrDetector::new().detect(&image).unwrap();
        assert_eq!(barcodes.len(), 1);
        let barcode = &barcodes[0];
        assert_eq!(barcode.format, BarcodeFormat::QrCode);
        assert_eq!(barcode.raw_value, content);
        assert_eq!(barcode.corner_points.len(), 4);

        let origin = (QUIET_MODULES * MODULE_PX) as i32;
        let end = origin + symbol_px as i32;
        let tolerance = MODULE_PX as i32 + 1;
        let bounds = barcode.bounding_box.unwrap();
        assert!((bounds.left - origin).abs() <= tolerance, "left {}", bounds.left);
        assert!((bounds.top - origin).abs() <= tolerance, "top {}", bounds.top);
        assert!((bounds.right - end).abs() <= tolerance, "right {}", bounds.right);
        assert!((bounds.bottom - end).abs() <= tolerance, "bottom {}", bounds.bottom);
    }

    #[test]
    fn test_blank_image_has_no_codes() {
        let image = GrayImage::from_pixel(64, 64, Luma([255]));
        assert!(QrDetector::new().detect(&image).unwrap().is_empty());
    }

    #[test]
    fn test_empty_image() {
        let image = GrayImage::new(0, 0);
        assert!(QrDetector::new().detect(&image).unwrap().is_empty());
    }

    #[test]
    fn test_noise_does_not_produce_codes() {
        let image = GrayImage::from_fn(120, 80, |x, y| {
            if (x / 7 + y / 5) % 2 == 0 {
                Luma([10])
            } else {
                Luma([240])
            }
        });
        assert!(QrDetector::new().detect(&image).unwrap().is_empty());
    }
}
