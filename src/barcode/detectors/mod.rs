// SPDX-License-Identifier: GPL-3.0-only

//! Barcode detectors
//!
//! Each detector looks at a grayscale image and returns the barcodes it could
//! decode. The processor runs every enabled detector on the same image and
//! merges the results.

pub mod linear;
pub mod qr;

pub use linear::LinearDetector;
pub use qr::QrDetector;

use super::types::{Barcode, BarcodeFormat};
use crate::errors::DetectionError;
use image::GrayImage;

/// Decoder contract shared by all symbology detectors
pub trait BarcodeDetector: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Formats this detector can report
    fn formats(&self) -> &[BarcodeFormat];

    /// Detect and decode barcodes in a grayscale image
    ///
    /// Coordinates of the returned barcodes are in pixels of `image`.
    fn detect(&self, image: &GrayImage) -> Result<Vec<Barcode>, DetectionError>;
}

/// Build the detectors needed to cover `formats`
///
/// `min_row_hits` is passed to the linear detector.
pub fn detectors_for(
    formats: &[BarcodeFormat],
    min_row_hits: u32,
) -> Vec<Box<dyn BarcodeDetector>> {
    let mut detectors: Vec<Box<dyn BarcodeDetector>> = Vec::new();

    if formats.contains(&BarcodeFormat::QrCode) {
        detectors.push(Box::new(QrDetector::new()));
    }

    let linear: Vec<BarcodeFormat> = formats
        .iter()
        .copied()
        .filter(|f| !f.is_two_dimensional())
        .collect();
    if !linear.is_empty() {
        detectors.push(Box::new(
            LinearDetector::with_formats(&linear).with_min_row_hits(min_row_hits),
        ));
    }

    detectors
}
