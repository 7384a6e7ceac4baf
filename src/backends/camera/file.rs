// SPDX-License-Identifier: GPL-3.0-only

//! File-backed camera
//!
//! Exposes image files and directories of images as camera devices. Each
//! still capture returns the next image in sorted order, cycling when the
//! end is reached. JPEG files are handed out as undecoded single-plane
//! frames, the same shape a still-capture pipeline produces; every other
//! format is decoded to RGBA.

use super::types::*;
use super::CameraBackend;
use crate::constants::file_formats;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Camera backend reading frames from image files
#[derive(Debug, Default)]
pub struct FileBackend {
    /// Files or directories offered as devices
    sources: Vec<PathBuf>,
    /// Bound device
    device: Option<CameraDevice>,
    /// Bound format
    format: Option<CameraFormat>,
    /// Images of the bound device in capture order
    images: Vec<PathBuf>,
    /// Index of the next image to capture
    cursor: usize,
}

impl FileBackend {
    /// Create a file backend without sources
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file backend offering the given files or directories
    pub fn with_sources(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    /// Build the device for a single source path
    pub fn device_for(path: &Path) -> CameraDevice {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mut device = CameraDevice::new(name, path.to_string_lossy());
        device.location = Some("external".to_string());
        device
    }

    /// Number of images available on the bound device
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// List the images behind a source: the file itself, or a directory's
/// supported images sorted by name
fn collect_images(path: &Path) -> BackendResult<Vec<PathBuf>> {
    if !path.exists() {
        return Err(BackendError::DeviceNotFound(path.display().to_string()));
    }

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(path)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    images.sort();
    Ok(images)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn has_image_extension(path: &Path) -> bool {
    file_formats::is_image_extension(&extension_of(path))
}

/// Load an image file as a camera frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    let bytes = std::fs::read(path)?;

    if file_formats::is_jpeg_extension(&extension_of(path)) {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| BackendError::CaptureFailed(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), width, height, "Loaded JPEG frame");
        return Ok(CameraFrame::new(width, height, bytes, PixelFormat::Jpeg));
    }

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| BackendError::CaptureFailed(format!("{}: {}", path.display(), e)))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    debug!(path = %path.display(), width, height, "Loaded image frame");
    Ok(CameraFrame::new(
        width,
        height,
        decoded.into_raw(),
        PixelFormat::RGBA,
    ))
}

impl CameraBackend for FileBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.sources
            .iter()
            .filter(|p| p.exists())
            .map(|p| Self::device_for(p))
            .collect()
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        let images = match collect_images(Path::new(&device.path)) {
            Ok(images) => images,
            Err(e) => {
                warn!(device = %device.path, error = %e, "Cannot list images");
                return Vec::new();
            }
        };

        let Some(first) = images.first() else {
            return Vec::new();
        };

        match image::image_dimensions(first) {
            Ok((width, height)) => {
                let pixel_format = if file_formats::is_jpeg_extension(&extension_of(first)) {
                    "MJPG"
                } else {
                    "RGBA"
                };
                vec![CameraFormat {
                    width,
                    height,
                    framerate: None,
                    pixel_format: pixel_format.to_string(),
                }]
            }
            Err(e) => {
                warn!(path = %first.display(), error = %e, "Cannot read image dimensions");
                Vec::new()
            }
        }
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        let images = collect_images(Path::new(&device.path))?;
        if images.is_empty() {
            return Err(BackendError::InitializationFailed(format!(
                "no images in {}",
                device.path
            )));
        }

        info!(
            device = %device.name,
            images = images.len(),
            "File camera initialized"
        );

        self.images = images;
        self.cursor = 0;
        self.device = Some(device.clone());
        self.format = Some(format.clone());
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        self.images.clear();
        self.cursor = 0;
        self.device = None;
        self.format = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    fn capture_photo(&mut self) -> BackendResult<CameraFrame> {
        let Some(device) = &self.device else {
            return Err(BackendError::NotInitialized);
        };
        if self.images.is_empty() {
            return Err(BackendError::CaptureFailed("no images".to_string()));
        }

        let path = &self.images[self.cursor % self.images.len()];
        self.cursor = (self.cursor + 1) % self.images.len();

        Ok(load_image_as_frame(path)?.with_rotation(device.rotation))
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

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("barcode-file-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_image(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 10, 10]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_directory_capture_cycles_in_name_order() {
        let dir = temp_dir("cycle");
        write_image(&dir.join("b.png"), 4, 2);
        write_image(&dir.join("a.png"), 2, 2);
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut backend = FileBackend::with_sources(vec![dir.clone()]);
        let device = backend.enumerate_cameras().remove(0);
        let format = backend.get_formats(&device).remove(0);
        assert_eq!((format.width, format.height), (2, 2));

        backend.initialize(&device, &format).unwrap();
        assert_eq!(backend.image_count(), 2);

        let widths: Vec<u32> = (0..3)
            .map(|_| backend.capture_photo().unwrap().width)
            .collect();
        assert_eq!(widths, vec![2, 4, 2]);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_jpeg_delivered_undecoded() {
        let dir = temp_dir("jpeg");
        let path = dir.join("still.jpg");
        write_image(&path, 8, 6);

        let frame = load_image_as_frame(&path).unwrap();
        assert_eq!(frame.format, PixelFormat::Jpeg);
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_capture_applies_device_rotation() {
        let dir = temp_dir("rotation");
        let path = dir.join("frame.png");
        write_image(&path, 4, 2);

        let mut backend = FileBackend::with_sources(vec![path.clone()]);
        let device = FileBackend::device_for(&path).with_rotation(SensorRotation::Rotate90);
        let format = backend.get_formats(&device).remove(0);
        backend.initialize(&device, &format).unwrap();

        let frame = backend.capture_photo().unwrap();
        assert_eq!(frame.format, PixelFormat::RGBA);
        assert_eq!(frame.rotation, SensorRotation::Rotate90);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_source_fails_to_initialize() {
        let mut backend = FileBackend::new();
        let device = CameraDevice::new("missing", "/nonexistent/barcode/source");
        let format = CameraFormat {
            width: 1,
            height: 1,
            framerate: None,
            pixel_format: "RGBA".to_string(),
        };
        assert!(matches!(
            backend.initialize(&device, &format),
            Err(BackendError::DeviceNotFound(_))
        ));
        assert!(matches!(
            backend.capture_photo(),
            Err(BackendError::NotInitialized)
        ));
    }
}
