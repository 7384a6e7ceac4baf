// SPDX-License-Identifier: MPL-2.0

//! Barcode Scanner - capture a still, find the barcodes in it, save the one
//! you pick
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction and session lifecycle
//! - [`media`]: Frame to bitmap conversion
//! - [`barcode`]: Barcode detectors and the processor running them
//! - [`pipelines`]: Annotation and JPEG encoding of saved images
//! - [`storage`]: Scan result persistence
//! - [`session`]: Scan workflow state and controller
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use barcode_scanner::{BarcodeProcessor, ScanResultStorage, ScanTimestamp};
//!
//! let image = image::open("label.jpg").unwrap().to_rgb8();
//! let processor = BarcodeProcessor::new();
//! if let Some(barcode) = processor.scan_barcode(&image) {
//!     let (code, code_type) = processor.scan_specific_barcode(&barcode);
//!     ScanResultStorage::new()
//!         .save_scan_result(
//!             &image,
//!             barcode.bounding_box.as_ref(),
//!             &code,
//!             &code_type,
//!             &ScanTimestamp::now(),
//!         )
//!         .unwrap();
//! }
//! ```

pub mod backends;
pub mod barcode;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use barcode::{Barcode, BarcodeFormat, BarcodeProcessor, BoundingBox};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use session::{ScanController, ScanSession, SessionMode};
pub use storage::{SavedScan, ScanResultStorage, ScanTimestamp};
