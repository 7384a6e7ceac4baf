// SPDX-License-Identifier: GPL-3.0-only

//! Scan workflow
//!
//! [`ScanSession`] is the state of one scan: live camera, captured image,
//! detected barcodes, the user's selection and the saved result.
//! [`ScanController`] drives it with the camera session, the barcode
//! processor and result storage.
//!
//! ```text
//!   Camera ──shutter──▶ Captured ──detect──▶ select ──scan──▶ save
//!     ▲                    │
//!     └──────retake────────┘
//! ```

use crate::backends::camera::{CameraBackendManager, CameraDevice, CameraFormat};
use crate::barcode::{Barcode, BarcodeProcessor, BoundingBox};
use crate::errors::{AppError, AppResult, CameraError, StorageError};
use crate::media::frame_to_rgb_async;
use crate::storage::{SavedScan, ScanResultStorage, ScanTimestamp};
use image::RgbImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shown when a still capture fails
pub const CAPTURE_FAILED_MESSAGE: &str = "Capture failed";

/// Shown when detection finds nothing
pub const NO_BARCODE_MESSAGE: &str = "No barcode found";

/// What the scanner is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Live camera, waiting for the shutter
    #[default]
    Camera,
    /// A still image was captured
    Captured,
}

/// Everything needed to save the selected barcode
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub image: Arc<RgbImage>,
    pub bounds: Option<BoundingBox>,
    pub code: String,
    pub code_type: String,
    pub timestamp: ScanTimestamp,
}

/// State of one scan
#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    mode: SessionMode,
    captured: Option<Arc<RgbImage>>,
    barcodes: Vec<Barcode>,
    selected: Option<usize>,
    scanned_code: String,
    code_type: String,
    timestamp: Option<ScanTimestamp>,
    detecting: bool,
    saving: bool,
    saved: bool,
    error_message: String,
    save_message: String,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn captured_image(&self) -> Option<&Arc<RgbImage>> {
        self.captured.as_ref()
    }

    pub fn barcodes(&self) -> &[Barcode] {
        &self.barcodes
    }

    /// Boxes of the detected barcodes, in detection order
    pub fn detection_boxes(&self) -> Vec<BoundingBox> {
        self.barcodes.iter().filter_map(|b| b.bounding_box).collect()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_barcode(&self) -> Option<&Barcode> {
        self.selected.and_then(|i| self.barcodes.get(i))
    }

    pub fn scanned_code(&self) -> &str {
        &self.scanned_code
    }

    pub fn code_type(&self) -> &str {
        &self.code_type
    }

    pub fn timestamp(&self) -> Option<&ScanTimestamp> {
        self.timestamp.as_ref()
    }

    pub fn is_detecting(&self) -> bool {
        self.detecting
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn save_message(&self) -> &str {
        &self.save_message
    }

    fn clear_detection(&mut self) {
        self.barcodes.clear();
        self.selected = None;
        self.scanned_code.clear();
        self.code_type.clear();
    }

    /// A still image was captured
    pub fn on_capture_success(&mut self, image: RgbImage) {
        self.captured = Some(Arc::new(image));
        self.mode = SessionMode::Captured;
        self.error_message.clear();
        self.clear_detection();
    }

    pub fn on_capture_error(&mut self) {
        self.error_message = CAPTURE_FAILED_MESSAGE.to_string();
    }

    /// Mark detection as running; returns the image to run it on
    pub fn begin_detection(&mut self) -> Option<Arc<RgbImage>> {
        let image = self.captured.clone()?;
        self.detecting = true;
        self.error_message.clear();
        Some(image)
    }

    pub fn on_detection(&mut self, barcodes: Vec<Barcode>) {
        self.detecting = false;
        self.selected = None;
        if barcodes.is_empty() {
            self.barcodes.clear();
            self.error_message = NO_BARCODE_MESSAGE.to_string();
        } else {
            self.barcodes = barcodes;
        }
    }

    /// Select a detected barcode; out of range indexes are ignored
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.barcodes.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    /// Read the selected barcode; returns its value and type name
    pub fn scan_selected(
        &mut self,
        processor: &BarcodeProcessor,
        timestamp: ScanTimestamp,
    ) -> Option<(String, String)> {
        let barcode = self.selected_barcode()?;
        let (code, code_type) = processor.scan_specific_barcode(barcode);
        self.scanned_code = code.clone();
        self.code_type = code_type.clone();
        self.timestamp = Some(timestamp);
        self.saved = false;
        Some((code, code_type))
    }

    /// Start saving; needs an image, a selection and a scanned code
    pub fn save_request(&mut self) -> Option<SaveRequest> {
        let image = self.captured.clone()?;
        let barcode = self.selected_barcode()?;
        if self.scanned_code.is_empty() {
            return None;
        }
        let request = SaveRequest {
            image,
            bounds: barcode.bounding_box,
            code: self.scanned_code.clone(),
            code_type: self.code_type.clone(),
            timestamp: self.timestamp.clone().unwrap_or_else(ScanTimestamp::now),
        };
        self.saved = false;
        self.saving = true;
        self.save_message.clear();
        Some(request)
    }

    pub fn on_saved(&mut self, result: &Result<SavedScan, StorageError>) {
        self.saving = false;
        match result {
            Ok(saved) => {
                self.saved = true;
                self.save_message = saved.message();
            }
            Err(e) => {
                self.saved = false;
                self.save_message = e.to_string();
            }
        }
    }

    /// Back to the live camera with a clean slate
    pub fn retake(&mut self) {
        *self = Self::default();
    }
}

/// Runs the scan workflow against real components
pub struct ScanController {
    camera: CameraBackendManager,
    processor: BarcodeProcessor,
    storage: ScanResultStorage,
    session: ScanSession,
    binding: Option<(CameraDevice, CameraFormat)>,
}

impl ScanController {
    pub fn new(
        camera: CameraBackendManager,
        processor: BarcodeProcessor,
        storage: ScanResultStorage,
    ) -> Self {
        Self {
            camera,
            processor,
            storage,
            session: ScanSession::new(),
            binding: None,
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn camera(&self) -> &CameraBackendManager {
        &self.camera
    }

    pub fn processor(&self) -> &BarcodeProcessor {
        &self.processor
    }

    /// Bind the camera and remember it for [`Self::retake`]
    pub fn start_camera(&mut self, device: &CameraDevice, format: &CameraFormat) -> AppResult<()> {
        self.camera.start_camera(device, format)?;
        self.binding = Some((device.clone(), format.clone()));
        Ok(())
    }

    /// Capture a still, then release the camera
    pub async fn shutter(&mut self) -> AppResult<()> {
        let captured = async {
            let frame = self.camera.take_picture().map_err(CameraError::from)?;
            let image = frame_to_rgb_async(Arc::new(frame)).await?;
            Ok::<_, AppError>(image)
        }
        .await;

        match captured {
            Ok(image) => {
                if let Err(e) = self.camera.stop_camera() {
                    warn!(error = %e, "Failed to stop camera after capture");
                }
                info!(width = image.width(), height = image.height(), "Still captured");
                self.session.on_capture_success(image);
                Ok(())
            }
            Err(e) => {
                self.session.on_capture_error();
                Err(e)
            }
        }
    }

    /// Detect barcodes in the captured image
    pub async fn detect(&mut self) -> AppResult<&[Barcode]> {
        let image = self
            .session
            .begin_detection()
            .ok_or_else(|| AppError::Other("No image captured".to_string()))?;

        let barcodes = self.processor.detect(image).await.unwrap_or_else(|e| {
            warn!(error = %e, "Barcode detection failed");
            Vec::new()
        });
        debug!(count = barcodes.len(), "Detection finished");
        self.session.on_detection(barcodes);
        Ok(self.session.barcodes())
    }

    pub fn select(&mut self, index: usize) -> bool {
        self.session.select(index)
    }

    /// Read the selected barcode, stamping the current time
    pub fn scan(&mut self) -> Option<(String, String)> {
        self.session
            .scan_selected(&self.processor, ScanTimestamp::now())
    }

    /// Save the scanned barcode and the annotated image
    pub async fn save(&mut self) -> AppResult<SavedScan> {
        let request = self
            .session
            .save_request()
            .ok_or_else(|| AppError::Other("Nothing scanned to save".to_string()))?;

        let result = self
            .storage
            .save_scan_result_async(
                request.image,
                request.bounds,
                request.code,
                request.code_type,
                request.timestamp,
            )
            .await;
        self.session.on_saved(&result);
        Ok(result?)
    }

    /// Discard the capture and rebind the last camera
    pub fn retake(&mut self) -> AppResult<()> {
        self.session.retake();
        match self.binding.clone() {
            Some((device, format)) => {
                self.camera.start_camera(&device, &format)?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_camera() {
            warn!(error = %e, "Failed to stop camera");
        }
    }
}
