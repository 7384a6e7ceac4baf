// SPDX-License-Identifier: MPL-2.0

//! Barcode detection and decoding
//!
//! - [`types`]: formats, boxes and decoded barcodes
//! - [`detectors`]: QR and linear symbology detectors
//! - [`processor`]: runs the enabled detectors over captured images

pub mod detectors;
pub mod processor;
pub mod types;

pub use detectors::BarcodeDetector;
pub use processor::{BarcodeProcessor, ProcessorOptions, barcode_type_name};
pub use types::{Barcode, BarcodeFormat, BoundingBox, FrameRegion, Point};
