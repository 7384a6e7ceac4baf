// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The capture pipeline is consumed through the [`CameraBackend`] trait so the
//! scan workflow does not care whether frames come from a V4L2 device or from
//! image files standing in for one.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   ScanController    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackendManager│  ← Bind / unbind lifecycle, thread-safe access
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴─────┐
//!      ▼           ▼
//!  ┌──────┐    ┌──────┐
//!  │ File │    │ V4L2 │
//!  └──────┘    └──────┘
//! ```

pub mod file;
pub mod frame_loop;
pub mod manager;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use file::FileBackend;
pub use frame_loop::{CaptureLoopController, LoopAction};
pub use manager::CameraBackendManager;
pub use types::*;

/// Complete camera backend trait
///
/// All camera backends must implement this trait to provide:
/// - Device enumeration and format detection
/// - Lifecycle management (initialization, shutdown)
/// - Still capture
pub trait CameraBackend: Send {
    // ===== Enumeration =====

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Get supported formats for a specific camera device
    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat>;

    // ===== Lifecycle =====

    /// Initialize the backend with a specific camera and format
    ///
    /// Must be called before any capture operations.
    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()>;

    /// Shutdown the backend and release all resources
    ///
    /// After shutdown, the backend must be reinitialized before use.
    fn shutdown(&mut self) -> BackendResult<()>;

    /// Check if the backend is currently initialized and operational
    fn is_initialized(&self) -> bool;

    // ===== Capture =====

    /// Capture a single still frame with the current settings
    ///
    /// # Returns
    /// * `Ok(CameraFrame)` - Frame captured successfully
    /// * `Err(BackendError::NotInitialized)` - No camera is bound
    /// * `Err(BackendError)` - Capture failed
    fn capture_photo(&mut self) -> BackendResult<CameraFrame>;

    // ===== Metadata =====

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is available on the current system
    fn is_available(&self) -> bool;

    /// Get the currently active camera device (if initialized)
    fn current_device(&self) -> Option<&CameraDevice>;

    /// Get the currently active format (if initialized)
    fn current_format(&self) -> Option<&CameraFormat>;
}

/// Create a backend instance for the requested type
///
/// The file backend starts without sources; callers add them with
/// [`FileBackend::with_sources`] or pass one in directly.
pub fn get_backend_for_type(
    backend_type: CameraBackendType,
) -> BackendResult<Box<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::File => Ok(Box::new(FileBackend::new())),
        #[cfg(feature = "v4l2")]
        CameraBackendType::V4l2 => Ok(Box::new(v4l2::V4l2Backend::new())),
        #[cfg(not(feature = "v4l2"))]
        CameraBackendType::V4l2 => Err(BackendError::NotAvailable(
            "built without the 'v4l2' feature".to_string(),
        )),
    }
}

/// Select the best format for still capture
///
/// Highest resolution wins; at equal resolution a compressed (MJPG) format is
/// preferred because it arrives as a single decodable plane.
pub fn select_still_format(formats: &[CameraFormat]) -> Option<CameraFormat> {
    formats
        .iter()
        .max_by_key(|f| {
            let compressed = PixelFormat::from_fourcc(&f.pixel_format)
                .map(|p| p.is_compressed())
                .unwrap_or(false);
            (u64::from(f.width) * u64::from(f.height), compressed)
        })
        .cloned()
}
