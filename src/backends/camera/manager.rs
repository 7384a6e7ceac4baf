// SPDX-License-Identifier: GPL-3.0-only

//! Camera session manager
//!
//! The manager owns the active backend and tracks whether a camera is bound
//! to the session. Binding always unbinds whatever was bound before, so at
//! most one capture session exists at a time.

use super::types::*;
use super::{CameraBackend, get_backend_for_type};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Internal manager state
struct ManagerState {
    /// The active backend instance
    backend: Box<dyn CameraBackend>,
    /// Backend type
    backend_type: CameraBackendType,
}

/// Camera backend manager
///
/// Thread-safe and can be shared across threads.
#[derive(Clone)]
pub struct CameraBackendManager {
    state: Arc<Mutex<ManagerState>>,
}

impl CameraBackendManager {
    /// Create a new backend manager for the given backend type
    pub fn new(backend_type: CameraBackendType) -> BackendResult<Self> {
        info!(backend = %backend_type, "Creating camera backend manager");
        Ok(Self::with_backend(get_backend_for_type(backend_type)?))
    }

    /// Create a manager around an already constructed backend
    pub fn with_backend(backend: Box<dyn CameraBackend>) -> Self {
        let backend_type = backend.backend_type();
        Self {
            state: Arc::new(Mutex::new(ManagerState {
                backend,
                backend_type,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        // A panic while holding the lock leaves the backend usable; recover it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the backend type
    pub fn backend_type(&self) -> CameraBackendType {
        self.lock().backend_type
    }

    /// Check if the backend is available on this system
    pub fn is_available(&self) -> bool {
        self.lock().backend.is_available()
    }

    /// Enumerate available cameras
    pub fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        let cameras = self.lock().backend.enumerate_cameras();
        if cameras.is_empty() {
            Err(BackendError::DeviceNotFound("No cameras found".to_string()))
        } else {
            Ok(cameras)
        }
    }

    /// Get supported formats for a camera
    pub fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        self.lock().backend.get_formats(device)
    }

    /// Bind a camera to the session
    ///
    /// Anything previously bound is unbound first. Binding failures are
    /// logged and returned to the caller.
    pub fn start_camera(&self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        info!(device = %device.name, format = %format, "Starting camera");

        let mut state = self.lock();
        if state.backend.is_initialized() {
            debug!("Unbinding previous camera session");
            if let Err(e) = state.backend.shutdown() {
                error!(error = %e, "Failed to unbind previous camera session");
            }
        }

        state.backend.initialize(device, format).inspect_err(|e| {
            error!(device = %device.name, error = %e, "Failed to start camera");
        })
    }

    /// Capture a still frame from the bound camera
    pub fn take_picture(&self) -> BackendResult<CameraFrame> {
        let mut state = self.lock();
        if !state.backend.is_initialized() {
            return Err(BackendError::NotInitialized);
        }

        let frame = state.backend.capture_photo().inspect_err(|e| {
            error!(error = %e, "Capture failed");
        })?;

        debug!(
            width = frame.width,
            height = frame.height,
            format = ?frame.format,
            "Frame captured from backend"
        );
        Ok(frame)
    }

    /// Unbind the camera; a no-op when nothing is bound
    pub fn stop_camera(&self) -> BackendResult<()> {
        let mut state = self.lock();
        if !state.backend.is_initialized() {
            return Ok(());
        }
        info!("Stopping camera");
        state.backend.shutdown()
    }

    /// Check whether a camera is bound to the session
    pub fn is_bound(&self) -> bool {
        self.lock().backend.is_initialized()
    }

    /// Get current device
    pub fn current_device(&self) -> Option<CameraDevice> {
        self.lock().backend.current_device().cloned()
    }

    /// Get current format
    pub fn current_format(&self) -> Option<CameraFormat> {
        self.lock().backend.current_format().cloned()
    }
}

impl std::fmt::Debug for CameraBackendManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CameraBackendManager")
            .field("backend_type", &state.backend_type)
            .field("bound", &state.backend.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend double counting lifecycle calls
    struct CountingBackend {
        device: Option<CameraDevice>,
        format: Option<CameraFormat>,
        shutdowns: Arc<AtomicUsize>,
        fail_initialize: bool,
    }

    impl CountingBackend {
        fn new(shutdowns: Arc<AtomicUsize>) -> Self {
            Self {
                device: None,
                format: None,
                shutdowns,
                fail_initialize: false,
            }
        }
    }

    impl CameraBackend for CountingBackend {
        fn enumerate_cameras(&self) -> Vec<CameraDevice> {
            vec![CameraDevice::new("Test", "test:0")]
        }

        fn get_formats(&self, _device: &CameraDevice) -> Vec<CameraFormat> {
            vec![test_format()]
        }

        fn initialize(
            &mut self,
            device: &CameraDevice,
            format: &CameraFormat,
        ) -> BackendResult<()> {
            if self.fail_initialize {
                return Err(BackendError::InitializationFailed("busy".to_string()));
            }
            self.device = Some(device.clone());
            self.format = Some(format.clone());
            Ok(())
        }

        fn shutdown(&mut self) -> BackendResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.device = None;
            self.format = None;
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.device.is_some()
        }

        fn capture_photo(&mut self) -> BackendResult<CameraFrame> {
            Ok(CameraFrame::new(2, 2, vec![0u8; 16], PixelFormat::RGBA))
        }

        fn backend_type(&self) -> CameraBackendType {
            CameraBackendType::File
        }

        fn is_available(&self) -> bool {
            true
        }

        fn current_device(&self) -> Option<&CameraDevice> {
            self.device.as_ref()
        }

        fn current_format(&self) -> Option<&CameraFormat> {
            self.format.as_ref()
        }
    }

    fn test_format() -> CameraFormat {
        CameraFormat {
            width: 2,
            height: 2,
            framerate: None,
            pixel_format: "RGBA".to_string(),
        }
    }

    #[test]
    fn test_start_camera_unbinds_previous_session() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let manager =
            CameraBackendManager::with_backend(Box::new(CountingBackend::new(shutdowns.clone())));
        let device = CameraDevice::new("Test", "test:0");

        manager.start_camera(&device, &test_format()).unwrap();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);

        manager.start_camera(&device, &test_format()).unwrap();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(manager.is_bound());
        assert_eq!(manager.current_device(), Some(device));
    }

    #[test]
    fn test_take_picture_requires_bound_camera() {
        let manager = CameraBackendManager::with_backend(Box::new(CountingBackend::new(
            Arc::new(AtomicUsize::new(0)),
        )));
        assert_eq!(manager.take_picture().unwrap_err(), BackendError::NotInitialized);
    }

    #[test]
    fn test_stop_camera_is_idempotent() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let manager =
            CameraBackendManager::with_backend(Box::new(CountingBackend::new(shutdowns.clone())));
        manager.stop_camera().unwrap();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);

        manager
            .start_camera(&CameraDevice::new("Test", "test:0"), &test_format())
            .unwrap();
        manager.stop_camera().unwrap();
        manager.stop_camera().unwrap();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(!manager.is_bound());
    }

    #[test]
    fn test_start_camera_failure_is_returned() {
        let mut backend = CountingBackend::new(Arc::new(AtomicUsize::new(0)));
        backend.fail_initialize = true;
        let manager = CameraBackendManager::with_backend(Box::new(backend));

        let result = manager.start_camera(&CameraDevice::new("Test", "test:0"), &test_format());
        assert!(matches!(result, Err(BackendError::InitializationFailed(_))));
        assert!(!manager.is_bound());
    }
}
