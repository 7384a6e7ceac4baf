// SPDX-License-Identifier: GPL-3.0-only

//! Barcode processing
//!
//! The processor owns the detectors for the enabled formats and runs them on
//! captured bitmaps. It is cheap to clone; clones share the detectors and the
//! released flag.

use super::detectors::{BarcodeDetector, detectors_for};
use super::types::{Barcode, BarcodeFormat};
use crate::constants::detection;
use crate::errors::DetectionError;
use crate::media::{downscale_to_fit, rgb_to_luma};
use image::RgbImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Processor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Formats reported by the processor
    pub formats: Vec<BarcodeFormat>,
    /// Downscale images whose largest side exceeds this before detection
    pub max_dimension: Option<u32>,
    /// Rows a linear barcode must be read on
    pub min_row_hits: u32,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            formats: BarcodeFormat::ALL.to_vec(),
            max_dimension: None,
            min_row_hits: detection::MIN_ROW_HITS,
        }
    }
}

impl ProcessorOptions {
    /// Settings for continuous analysis of camera frames
    pub fn analysis() -> Self {
        Self {
            max_dimension: Some(detection::ANALYSIS_MAX_DIMENSION),
            ..Self::default()
        }
    }
}

struct ProcessorInner {
    detectors: Vec<Box<dyn BarcodeDetector>>,
    options: ProcessorOptions,
    released: AtomicBool,
}

/// Runs barcode detectors over captured images
#[derive(Clone)]
pub struct BarcodeProcessor {
    inner: Arc<ProcessorInner>,
}

impl Default for BarcodeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeProcessor {
    /// Processor for every supported format at full resolution
    pub fn new() -> Self {
        Self::with_options(ProcessorOptions::default())
    }

    pub fn with_options(options: ProcessorOptions) -> Self {
        let detectors = detectors_for(&options.formats, options.min_row_hits);
        Self::with_detectors(detectors, options)
    }

    /// Processor around custom detectors
    pub fn with_detectors(
        detectors: Vec<Box<dyn BarcodeDetector>>,
        options: ProcessorOptions,
    ) -> Self {
        info!(
            detectors = ?detectors.iter().map(|d| d.name()).collect::<Vec<_>>(),
            formats = ?options.formats,
            max_dimension = ?options.max_dimension,
            "Barcode processor ready"
        );
        Self {
            inner: Arc::new(ProcessorInner {
                detectors,
                options,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.inner.options
    }

    /// Check whether `format` is reported by this processor
    pub fn is_enabled(&self, format: BarcodeFormat) -> bool {
        self.inner.options.formats.contains(&format)
    }

    /// Detect barcodes, propagating detector failures
    ///
    /// Barcodes are ordered by detector (2D first), then by position.
    /// Coordinates refer to `image` even when detection ran on a downscaled
    /// copy.
    pub fn try_detect(&self, image: &RgbImage) -> Result<Vec<Barcode>, DetectionError> {
        if self.is_released() {
            return Err(DetectionError::Released);
        }

        let start = std::time::Instant::now();
        let (width, height) = image.dimensions();
        let luma = rgb_to_luma(image);
        let max_dimension = self.inner.options.max_dimension.unwrap_or(0);
        let (analysis, scale) = downscale_to_fit(&luma, max_dimension);
        let back = 1.0 / scale;

        let mut barcodes: Vec<Barcode> = Vec::new();
        for detector in &self.inner.detectors {
            for barcode in detector.detect(&analysis)? {
                if !self.is_enabled(barcode.format) {
                    debug!(format = %barcode.format, "Dropping barcode of disabled format");
                    continue;
                }
                let barcode = barcode.rescaled(back, width, height);
                let duplicate = barcodes.iter().any(|b| {
                    b.format == barcode.format
                        && b.raw_value == barcode.raw_value
                        && match (b.bounding_box, barcode.bounding_box) {
                            (Some(a), Some(c)) => a.intersects(&c),
                            _ => true,
                        }
                });
                if !duplicate {
                    barcodes.push(barcode);
                }
            }
        }

        debug!(
            count = barcodes.len(),
            width,
            height,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Barcode detection complete"
        );
        Ok(barcodes)
    }

    /// Detect barcodes; failures are logged and yield no barcodes
    pub fn detect_barcodes(&self, image: &RgbImage) -> Vec<Barcode> {
        self.try_detect(image).unwrap_or_else(|e| {
            warn!(error = %e, "Barcode detection failed");
            Vec::new()
        })
    }

    /// Detect barcodes on the blocking pool
    pub async fn detect(&self, image: Arc<RgbImage>) -> Result<Vec<Barcode>, DetectionError> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.try_detect(&image))
            .await
            .map_err(|e| DetectionError::TaskFailed(e.to_string()))?
    }

    /// First barcode found in the image, if any
    pub fn scan_barcode(&self, image: &RgbImage) -> Option<Barcode> {
        self.detect_barcodes(image).into_iter().next()
    }

    /// Decoded value and type name of a barcode
    pub fn scan_specific_barcode(&self, barcode: &Barcode) -> (String, String) {
        (
            barcode.raw_value.clone(),
            barcode_type_name(barcode.format).to_string(),
        )
    }

    /// Close the processor; further detections fail
    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::SeqCst) {
            info!("Barcode processor released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for BarcodeProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarcodeProcessor")
            .field("options", &self.inner.options)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Type name stored with a scan result
pub fn barcode_type_name(format: BarcodeFormat) -> &'static str {
    format.display_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::detectors::linear::testing::{ean13_widths, render, scaled};
    use crate::barcode::types::BoundingBox;
    use image::{DynamicImage, GrayImage};

    /// Detector double returning fixed results
    struct FixedDetector {
        result: Result<Vec<Barcode>, DetectionError>,
    }

    impl BarcodeDetector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn formats(&self) -> &[BarcodeFormat] {
            &BarcodeFormat::ALL
        }

        fn detect(&self, _image: &GrayImage) -> Result<Vec<Barcode>, DetectionError> {
            self.result.clone()
        }
    }

    fn fixed(result: Result<Vec<Barcode>, DetectionError>) -> BarcodeProcessor {
        BarcodeProcessor::with_detectors(
            vec![Box::new(FixedDetector { result })],
            ProcessorOptions::default(),
        )
    }

    fn ean13_image(module: u32) -> RgbImage {
        let widths = scaled(&ean13_widths("4006381333931"), module);
        DynamicImage::ImageLuma8(render(&widths, 15 * module, 40 * module)).to_rgb8()
    }

    #[test]
    fn test_detects_ean13_in_rgb_image() {
        let processor = BarcodeProcessor::new();
        let image = ean13_image(2);
        let barcode = processor.scan_barcode(&image).unwrap();
        assert_eq!(barcode.format, BarcodeFormat::Ean13);
        assert_eq!(
            processor.scan_specific_barcode(&barcode),
            ("4006381333931".to_string(), "EAN-13".to_string())
        );
    }

    #[test]
    fn test_downscaled_boxes_map_back_to_source() {
        let image = ean13_image(6);
        let processor = BarcodeProcessor::with_options(ProcessorOptions {
            max_dimension: Some(image.width() / 2),
            ..ProcessorOptions::default()
        });
        let barcodes = processor.try_detect(&image).unwrap();
        assert_eq!(barcodes.len(), 1);

        let bounds = barcodes[0].bounding_box.unwrap();
        let expected_left = 15 * 6;
        let expected_right = expected_left + 95 * 6;
        assert!((bounds.left - expected_left).abs() <= 4, "{}", bounds);
        assert!((bounds.right - expected_right).abs() <= 4, "{}", bounds);
        assert!(bounds.right <= image.width() as i32);
    }

    #[test]
    fn test_disabled_formats_are_dropped() {
        let processor = BarcodeProcessor::with_detectors(
            vec![Box::new(FixedDetector {
                result: Ok(vec![
                    Barcode::new(BarcodeFormat::QrCode, "qr"),
                    Barcode::new(BarcodeFormat::Code39, "C39"),
                ]),
            })],
            ProcessorOptions {
                formats: vec![BarcodeFormat::Code39],
                ..ProcessorOptions::default()
            },
        );
        let barcodes = processor.detect_barcodes(&RgbImage::new(4, 4));
        assert_eq!(barcodes.len(), 1);
        assert_eq!(barcodes[0].raw_value, "C39");
    }

    #[test]
    fn test_duplicates_are_merged() {
        let a = Barcode::new(BarcodeFormat::QrCode, "same")
            .with_bounding_box(BoundingBox::new(0, 0, 10, 10));
        let b = Barcode::new(BarcodeFormat::QrCode, "same")
            .with_bounding_box(BoundingBox::new(5, 5, 15, 15));
        let c = Barcode::new(BarcodeFormat::QrCode, "same")
            .with_bounding_box(BoundingBox::new(50, 50, 60, 60));
        let processor = fixed(Ok(vec![a, b, c]));
        assert_eq!(processor.detect_barcodes(&RgbImage::new(64, 64)).len(), 2);
    }

    #[test]
    fn test_detector_failure_yields_empty_list() {
        let processor = fixed(Err(DetectionError::DetectorFailed {
            detector: "fixed",
            reason: "boom".to_string(),
        }));
        let image = RgbImage::new(4, 4);
        assert!(processor.detect_barcodes(&image).is_empty());
        assert!(processor.scan_barcode(&image).is_none());
        assert!(matches!(
            processor.try_detect(&image),
            Err(DetectionError::DetectorFailed { .. })
        ));
    }

    #[test]
    fn test_release() {
        let processor = fixed(Ok(vec![Barcode::new(BarcodeFormat::Ean8, "96385074")]));
        let clone = processor.clone();
        let image = RgbImage::new(4, 4);
        assert_eq!(processor.detect_barcodes(&image).len(), 1);

        clone.release();
        clone.release();
        assert!(processor.is_released());
        assert_eq!(processor.try_detect(&image), Err(DetectionError::Released));
        assert!(processor.detect_barcodes(&image).is_empty());
    }

    #[tokio::test]
    async fn test_async_detect() {
        let processor = BarcodeProcessor::new();
        let barcodes = processor.detect(Arc::new(ean13_image(2))).await.unwrap();
        assert_eq!(barcodes.len(), 1);
        assert_eq!(barcodes[0].raw_value, "4006381333931");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(barcode_type_name(BarcodeFormat::QrCode), "QR Code");
        assert_eq!(barcode_type_name(BarcodeFormat::Ean8), "EAN-8");
        assert_eq!(barcode_type_name(BarcodeFormat::UpcA), "UPC-A");
    }
}
