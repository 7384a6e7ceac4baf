// SPDX-License-Identifier: GPL-3.0-only

//! Native V4L2 capture backend
//!
//! Stills are taken from a short-lived mmap stream: the stream is opened on
//! demand, a few frames are dropped while exposure settles and the next one
//! is returned. MJPG is preferred so the still arrives as a single JPEG
//! plane; YUYV is the fallback.

use super::types::*;
use super::CameraBackend;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Buffers queued on the capture stream
const STREAM_BUFFERS: u32 = 4;

/// Formats requested from the driver, in order of preference
const PREFERRED_FOURCCS: [&[u8; 4]; 2] = [b"MJPG", b"YUYV"];

/// V4L2 camera backend
pub struct V4l2Backend {
    device: Option<Device>,
    camera: Option<CameraDevice>,
    format: Option<CameraFormat>,
    warmup: Duration,
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            device: None,
            camera: None,
            format: None,
            warmup: crate::constants::timing::WARMUP,
        }
    }

    /// Set how long frames are discarded after the stream starts
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }
}

fn fourcc_string(fourcc: v4l::FourCC) -> String {
    fourcc.str().map(str::to_string).unwrap_or_else(|_| format!("{:?}", fourcc))
}

fn open(path: &str) -> BackendResult<Device> {
    Device::with_path(path).map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path, e)))
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let mut cameras: Vec<CameraDevice> = v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let path = node.path().to_string_lossy().to_string();
                let dev = Device::with_path(&path).ok()?;
                let caps = dev.query_caps().ok()?;
                if !caps
                    .capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                {
                    debug!(path = %path, "Skipping node without capture capability");
                    return None;
                }
                let name = node.name().unwrap_or_else(|| caps.card.clone());
                Some(CameraDevice::new(name, path))
            })
            .collect();
        cameras.sort_by(|a, b| a.path.cmp(&b.path));
        cameras
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        let dev = match open(&device.path) {
            Ok(dev) => dev,
            Err(e) => {
                warn!(error = %e, "Cannot query formats");
                return Vec::new();
            }
        };

        let descriptions = match dev.enum_formats() {
            Ok(descriptions) => descriptions,
            Err(e) => {
                warn!(device = %device.path, error = %e, "Format enumeration failed");
                return Vec::new();
            }
        };

        let mut formats = Vec::new();
        for description in descriptions {
            let pixel_format = fourcc_string(description.fourcc);
            if PixelFormat::from_fourcc(&pixel_format).is_none() {
                continue;
            }
            let Ok(sizes) = dev.enum_framesizes(description.fourcc) else {
                continue;
            };
            for size in sizes {
                let (width, height) = match size.size {
                    FrameSizeEnum::Discrete(d) => (d.width, d.height),
                    FrameSizeEnum::Stepwise(s) => (s.max_width, s.max_height),
                };
                formats.push(CameraFormat {
                    width,
                    height,
                    framerate: None,
                    pixel_format: pixel_format.clone(),
                });
            }
        }
        formats
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        let dev = open(&device.path)?;

        let mut requested = dev
            .format()
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        requested.width = format.width;
        requested.height = format.height;

        let mut applied = None;
        let preferred = format.pixel_format.as_bytes();
        let candidates = std::iter::once(preferred)
            .filter(|f| f.len() == 4)
            .chain(PREFERRED_FOURCCS.iter().map(|f| &f[..]));
        for fourcc in candidates {
            let mut code = [0u8; 4];
            code.copy_from_slice(fourcc);
            requested.fourcc = v4l::FourCC::new(&code);
            match dev.set_format(&requested) {
                Ok(f) if PixelFormat::from_fourcc(&fourcc_string(f.fourcc)).is_some() => {
                    applied = Some(f);
                    break;
                }
                Ok(f) => {
                    debug!(fourcc = %fourcc_string(f.fourcc), "Driver chose unsupported format")
                }
                Err(e) => debug!(error = %e, "set_format rejected"),
            }
        }

        let applied = applied.ok_or_else(|| {
            BackendError::FormatNotSupported(format!("{} on {}", format, device.path))
        })?;

        let bound = CameraFormat {
            width: applied.width,
            height: applied.height,
            framerate: None,
            pixel_format: fourcc_string(applied.fourcc),
        };
        info!(device = %device.name, format = %bound, "V4L2 camera initialized");

        self.device = Some(dev);
        self.camera = Some(device.clone());
        self.format = Some(bound);
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        self.device = None;
        self.camera = None;
        self.format = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    fn capture_photo(&mut self) -> BackendResult<CameraFrame> {
        let (Some(dev), Some(camera)) = (&self.device, &self.camera) else {
            return Err(BackendError::NotInitialized);
        };

        let active = dev
            .format()
            .map_err(|e| BackendError::CaptureFailed(e.to_string()))?;
        let fourcc = fourcc_string(active.fourcc);
        let pixel_format = PixelFormat::from_fourcc(&fourcc)
            .ok_or_else(|| BackendError::FormatNotSupported(fourcc))?;

        let mut stream = MmapStream::with_buffers(dev, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| BackendError::CaptureFailed(format!("stream: {}", e)))?;

        let started = Instant::now();
        let mut dropped = 0u32;
        loop {
            let (buf, meta) = stream
                .next()
                .map_err(|e| BackendError::CaptureFailed(e.to_string()))?;
            if started.elapsed() < self.warmup {
                dropped += 1;
                continue;
            }

            let used = (meta.bytesused as usize).min(buf.len());
            let data = if used > 0 { &buf[..used] } else { buf };
            debug!(
                sequence = meta.sequence,
                bytes = data.len(),
                dropped,
                "V4L2 still captured"
            );

            let mut frame =
                CameraFrame::new(active.width, active.height, data.to_vec(), pixel_format);
            if !pixel_format.is_compressed() && active.stride > 0 {
                frame.stride = active.stride;
            }
            return Ok(frame.with_rotation(camera.rotation));
        }
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        !v4l::context::enum_devices().is_empty()
    }

    fn current_device(&self) -> Option<&CameraDevice> {
        self.camera.as_ref()
    }

    fn current_format(&self) -> Option<&CameraFormat> {
        self.format.as_ref()
    }
}
