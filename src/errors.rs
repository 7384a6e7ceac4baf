// SPDX-License-Identifier: MPL-2.0

//! Error types for the barcode scanner

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Frame to bitmap conversion errors
    Conversion(ConversionError),
    /// Barcode detection errors
    Detection(DetectionError),
    /// Scan result persistence errors
    Storage(StorageError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Camera initialization (binding) failed
    InitializationFailed(String),
    /// No camera is bound to the session
    NotBound,
    /// Still capture failed
    CaptureFailed(String),
    /// Backend error (e.g., V4L2)
    BackendError(String),
}

/// Errors converting a captured frame to an RGB bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Frame reports a zero width or height
    InvalidDimensions { width: u32, height: u32 },
    /// Frame buffer is shorter than its declared geometry
    BufferTooSmall { expected: usize, actual: usize },
    /// Compressed frame could not be decoded
    Decode(String),
}

/// Barcode detection errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// The processor was released and can no longer be used
    Released,
    /// A detector failed on the given image
    DetectorFailed { detector: &'static str, reason: String },
    /// Background detection task failed
    TaskFailed(String),
}

/// Scan result persistence errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Timestamp does not follow the `yyyyMMdd_HHmmss` layout
    InvalidTimestamp(String),
    /// Image could not be annotated or encoded
    EncodingFailed(String),
    /// Writing a file failed
    WriteFailed(String),
    /// No storage location could be resolved
    NoOutputDirectory,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Conversion(e) => write!(f, "Conversion error: {}", e),
            AppError::Detection(e) => write!(f, "Detection error: {}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CameraError::NotBound => write!(f, "No camera is bound"),
            CameraError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CameraError::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::InvalidDimensions { width, height } => {
                write!(f, "Invalid frame dimensions {}x{}", width, height)
            }
            ConversionError::BufferTooSmall { expected, actual } => write!(
                f,
                "Frame buffer too small: expected {} bytes, got {}",
                expected, actual
            ),
            ConversionError::Decode(msg) => write!(f, "Failed to decode frame: {}", msg),
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::Released => write!(f, "Barcode processor has been released"),
            DetectionError::DetectorFailed { detector, reason } => {
                write!(f, "{} detector failed: {}", detector, reason)
            }
            DetectionError::TaskFailed(msg) => write!(f, "Detection task failed: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidTimestamp(ts) => {
                write!(f, "Save failed: invalid timestamp '{}'", ts)
            }
            StorageError::EncodingFailed(msg) => write!(f, "Save failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Save failed: {}", msg),
            StorageError::NoOutputDirectory => {
                write!(f, "Save failed: no output directory available")
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for ConversionError {}
impl std::error::Error for DetectionError {}
impl std::error::Error for StorageError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        AppError::Conversion(err)
    }
}

impl From<DetectionError> for AppError {
    fn from(err: DetectionError) -> Self {
        AppError::Detection(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<crate::backends::camera::BackendError> for AppError {
    fn from(err: crate::backends::camera::BackendError) -> Self {
        AppError::Camera(err.into())
    }
}

impl From<crate::backends::camera::BackendError> for CameraError {
    fn from(err: crate::backends::camera::BackendError) -> Self {
        use crate::backends::camera::BackendError;
        match err {
            BackendError::DeviceNotFound(_) => CameraError::NoCameraFound,
            BackendError::InitializationFailed(msg) => CameraError::InitializationFailed(msg),
            BackendError::NotInitialized => CameraError::NotBound,
            BackendError::CaptureFailed(msg) => CameraError::CaptureFailed(msg),
            other => CameraError::BackendError(other.to_string()),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::WriteFailed(err.to_string())
    }
}

impl From<image::ImageError> for StorageError {
    fn from(err: image::ImageError) -> Self {
        StorageError::EncodingFailed(err.to_string())
    }
}

impl From<image::ImageError> for ConversionError {
    fn from(err: image::ImageError) -> Self {
        ConversionError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
