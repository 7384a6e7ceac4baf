// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Image files and directories exposed as cameras
    #[default]
    File,
    /// Native V4L2 capture devices
    V4l2,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::File => write!(f, "file"),
            CameraBackendType::V4l2 => write!(f, "V4L2"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to the device.
/// Still captures carry this value so the decoded bitmap can be turned upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Backend specific locator (image path, directory, or /dev/videoN)
    pub path: String,
    /// Sensor rotation applied to still captures
    pub rotation: SensorRotation,
    /// Camera location: "front", "back", or "external"
    pub location: Option<String>,
}

impl CameraDevice {
    /// Create a device with no rotation and unknown location
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            rotation: SensorRotation::None,
            location: None,
        }
    }

    /// Set the sensor rotation
    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>, // None for still-only sources
    pub pixel_format: String,         // FourCC code (e.g., "MJPG", "YUYV")
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(
                f,
                "{}x{} {} @ {}fps",
                self.width, self.height, self.pixel_format, fps
            )
        } else {
            write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
        }
    }
}

/// Pixel format for camera frames
///
/// Still captures usually arrive as a single compressed JPEG plane, while
/// analysis frames come in one of the raw YUV layouts and are converted on
/// the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Single-plane JPEG bitstream
    Jpeg,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// NV21 - Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    NV21,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
}

impl PixelFormat {
    /// Check if this format carries a compressed bitstream
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// Bytes per pixel of single-plane uncompressed layouts
    ///
    /// Returns `None` for JPEG and the multi-plane 4:2:0 formats, whose rows
    /// are not a whole number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::RGBA | Self::BGRA => Some(4),
            Self::RGB24 => Some(3),
            Self::YUYV | Self::UYVY => Some(2),
            Self::Gray8 => Some(1),
            Self::Jpeg | Self::NV12 | Self::NV21 | Self::I420 => None,
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &str) -> Option<Self> {
        match fourcc.trim() {
            "MJPG" | "JPEG" => Some(Self::Jpeg),
            "AB24" | "RGBA" => Some(Self::RGBA),
            "AR24" | "BGRA" => Some(Self::BGRA),
            "RGB3" => Some(Self::RGB24),
            "GREY" | "Y800" => Some(Self::Gray8),
            "NV12" => Some(Self::NV12),
            "NV21" => Some(Self::NV21),
            "YU12" | "I420" => Some(Self::I420),
            "YUYV" | "YUY2" => Some(Self::YUYV),
            "UYVY" => Some(Self::UYVY),
            _ => None,
        }
    }
}

/// Plane layout for multi-plane YUV formats (NV12, NV21, I420)
///
/// Planes are stored at different offsets within a single contiguous buffer.
/// The Y plane always starts at offset 0 and uses the frame stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YuvPlanes {
    /// UV plane offset in bytes (NV12/NV21: interleaved chroma, I420: U plane)
    pub uv_offset: usize,
    /// UV plane stride in bytes
    pub uv_stride: u32,
    /// V plane offset in bytes (I420 only, 0 for semi-planar)
    pub v_offset: usize,
    /// V plane stride in bytes (I420 only)
    pub v_stride: u32,
}

impl YuvPlanes {
    /// Tightly packed semi-planar layout (NV12/NV21) for the given Y stride
    pub fn semi_planar(height: u32, y_stride: u32) -> Self {
        Self {
            uv_offset: (y_stride * height) as usize,
            uv_stride: y_stride,
            v_offset: 0,
            v_stride: 0,
        }
    }

    /// Tightly packed planar layout (I420) for the given Y stride
    pub fn planar(height: u32, y_stride: u32) -> Self {
        let y_size = (y_stride * height) as usize;
        let chroma_stride = y_stride.div_ceil(2);
        let chroma_size = (chroma_stride * height.div_ceil(2)) as usize;
        Self {
            uv_offset: y_size,
            uv_stride: chroma_stride,
            v_offset: y_size + chroma_size,
            v_stride: chroma_stride,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Frame data: JPEG bitstream, packed pixels, or all YUV planes contiguous
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride for the main data (bytes per row, may include padding)
    pub stride: u32,
    /// Additional YUV planes (for NV12/NV21/I420 formats)
    pub yuv_planes: Option<YuvPlanes>,
    /// Clockwise rotation needed to display the frame upright
    pub rotation: SensorRotation,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Create a frame with tightly packed rows and no rotation
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>, format: PixelFormat) -> Self {
        // Planar formats use the stride of the Y plane
        let stride = match format {
            PixelFormat::Jpeg => 0,
            PixelFormat::NV12 | PixelFormat::NV21 | PixelFormat::I420 | PixelFormat::Gray8 => {
                width
            }
            PixelFormat::YUYV | PixelFormat::UYVY => width * 2,
            PixelFormat::RGB24 => width * 3,
            PixelFormat::RGBA | PixelFormat::BGRA => width * 4,
        };
        let yuv_planes = match format {
            PixelFormat::NV12 | PixelFormat::NV21 => Some(YuvPlanes::semi_planar(height, width)),
            PixelFormat::I420 => Some(YuvPlanes::planar(height, width)),
            _ => None,
        };
        Self {
            width,
            height,
            data: data.into(),
            format,
            stride,
            yuv_planes,
            rotation: SensorRotation::None,
            captured_at: Instant::now(),
        }
    }

    /// Set the rotation to apply when converting to a bitmap
    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Operation requires a bound camera
    NotInitialized,
    /// Still capture failed
    CaptureFailed(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::NotInitialized => write!(f, "Camera is not initialized"),
            BackendError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_bytes_per_pixel() {
        assert_eq!(PixelFormat::BGRA.bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::RGB24.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::UYVY.bytes_per_pixel(), Some(2));
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), Some(1));
        assert_eq!(PixelFormat::NV12.bytes_per_pixel(), None);
        assert_eq!(PixelFormat::Jpeg.bytes_per_pixel(), None);
    }

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc("MJPG"), Some(PixelFormat::Jpeg));
        assert_eq!(PixelFormat::from_fourcc("YUYV"), Some(PixelFormat::YUYV));
        assert_eq!(PixelFormat::from_fourcc("YU12"), Some(PixelFormat::I420));
        assert_eq!(PixelFormat::from_fourcc("H264"), None);
    }

    #[test]
    fn test_planar_layout_offsets() {
        // 4x2 I420: Y = 8 bytes, U = 2x1 = 2 bytes, V = 2 bytes
        let planes = YuvPlanes::planar(2, 4);
        assert_eq!(planes.uv_offset, 8);
        assert_eq!(planes.uv_stride, 2);
        assert_eq!(planes.v_offset, 10);

        let planes = YuvPlanes::semi_planar(2, 4);
        assert_eq!(planes.uv_offset, 8);
        assert_eq!(planes.uv_stride, 4);
    }

    #[test]
    fn test_frame_new_computes_stride() {
        let frame = CameraFrame::new(3, 2, vec![0u8; 18], PixelFormat::RGB24);
        assert_eq!(frame.stride, 9);
        assert!(frame.yuv_planes.is_none());

        let frame = CameraFrame::new(4, 2, vec![0u8; 12], PixelFormat::NV12);
        assert_eq!(frame.stride, 4);
        assert!(frame.yuv_planes.is_some());
    }
}
