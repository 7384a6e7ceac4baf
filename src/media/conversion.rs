// SPDX-License-Identifier: GPL-3.0-only

//! Frame to bitmap conversion
//!
//! Still captures arrive as a single JPEG plane and only need decoding.
//! Analysis frames come in raw layouts and are converted here on the CPU with
//! full-range BT.601 coefficients. Every path ends by turning the bitmap
//! upright according to the frame's rotation.

use crate::backends::camera::types::{CameraFrame, PixelFormat, SensorRotation, YuvPlanes};
use crate::errors::ConversionError;
use image::{GrayImage, ImageFormat, RgbImage, imageops};
use std::sync::Arc;
use tracing::{debug, trace};

/// Convert one full-range YUV sample to RGB
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    [
        (y + 1.402 * v).clamp(0.0, 255.0) as u8,
        (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8,
        (y + 1.772 * u).clamp(0.0, 255.0) as u8,
    ]
}

/// Bytes needed to hold `rows` rows of `row_bytes` at `stride`
fn required_len(offset: usize, stride: usize, rows: usize, row_bytes: usize) -> usize {
    if rows == 0 {
        offset
    } else {
        offset + stride * (rows - 1) + row_bytes
    }
}

fn ensure_len(data: &[u8], expected: usize) -> Result<(), ConversionError> {
    if data.len() < expected {
        Err(ConversionError::BufferTooSmall {
            expected,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Rotate a bitmap clockwise so it is displayed upright
pub fn apply_rotation(image: RgbImage, rotation: SensorRotation) -> RgbImage {
    match rotation {
        SensorRotation::None => image,
        SensorRotation::Rotate90 => imageops::rotate90(&image),
        SensorRotation::Rotate180 => imageops::rotate180(&image),
        SensorRotation::Rotate270 => imageops::rotate270(&image),
    }
}

/// Convert a captured frame into an upright RGB bitmap
pub fn frame_to_rgb(frame: &CameraFrame) -> Result<RgbImage, ConversionError> {
    let (width, height) = (frame.width, frame.height);
    if width == 0 || height == 0 {
        return Err(ConversionError::InvalidDimensions { width, height });
    }

    let rgb = match frame.format {
        PixelFormat::Jpeg => decode_jpeg(&frame.data)?,
        PixelFormat::RGBA | PixelFormat::BGRA | PixelFormat::RGB24 | PixelFormat::Gray8 => {
            convert_packed_rgb(frame)?
        }
        PixelFormat::NV12 | PixelFormat::NV21 => convert_semi_planar(frame)?,
        PixelFormat::I420 => convert_planar(frame)?,
        PixelFormat::YUYV | PixelFormat::UYVY => convert_packed_yuv(frame)?,
    };

    trace!(
        format = ?frame.format,
        width = rgb.width(),
        height = rgb.height(),
        rotation = %frame.rotation,
        "Frame converted"
    );
    Ok(apply_rotation(rgb, frame.rotation))
}

/// Convert a frame on the blocking pool
pub async fn frame_to_rgb_async(frame: Arc<CameraFrame>) -> Result<RgbImage, ConversionError> {
    tokio::task::spawn_blocking(move || frame_to_rgb(&frame))
        .await
        .map_err(|e| ConversionError::Decode(format!("conversion task failed: {}", e)))?
}

fn decode_jpeg(data: &[u8]) -> Result<RgbImage, ConversionError> {
    if data.is_empty() {
        return Err(ConversionError::Decode("empty JPEG plane".to_string()));
    }
    let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    debug!(
        width = decoded.width(),
        height = decoded.height(),
        "Decoded JPEG still"
    );
    Ok(decoded.to_rgb8())
}

fn convert_packed_rgb(frame: &CameraFrame) -> Result<RgbImage, ConversionError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let bpp = frame.format.bytes_per_pixel().unwrap_or(1);
    let stride = (frame.stride as usize).max(width * bpp);
    ensure_len(&frame.data, required_len(0, stride, height, width * bpp))?;

    let mut out = Vec::with_capacity(width * height * 3);
    for row in frame.data.chunks(stride).take(height) {
        for px in row[..width * bpp].chunks_exact(bpp) {
            match frame.format {
                PixelFormat::BGRA => out.extend_from_slice(&[px[2], px[1], px[0]]),
                PixelFormat::Gray8 => out.extend_from_slice(&[px[0], px[0], px[0]]),
                _ => out.extend_from_slice(&px[..3]),
            }
        }
    }

    RgbImage::from_raw(frame.width, frame.height, out)
        .ok_or_else(|| ConversionError::Decode("RGB buffer size mismatch".to_string()))
}

fn convert_semi_planar(frame: &CameraFrame) -> Result<RgbImage, ConversionError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let y_stride = (frame.stride as usize).max(width);
    let planes = frame
        .yuv_planes
        .unwrap_or_else(|| YuvPlanes::semi_planar(frame.height, y_stride as u32));
    let uv_stride = (planes.uv_stride as usize).max(width.div_ceil(2) * 2);
    let chroma_rows = height.div_ceil(2);

    ensure_len(&frame.data, required_len(0, y_stride, height, width))?;
    ensure_len(
        &frame.data,
        required_len(planes.uv_offset, uv_stride, chroma_rows, width.div_ceil(2) * 2),
    )?;

    let data = &frame.data;
    let (u_index, v_index) = match frame.format {
        PixelFormat::NV21 => (1, 0),
        _ => (0, 1),
    };

    let mut out = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let y_row = &data[row * y_stride..row * y_stride + width];
        let uv_start = planes.uv_offset + (row / 2) * uv_stride;
        for (col, &y) in y_row.iter().enumerate() {
            let pair = uv_start + (col / 2) * 2;
            out.extend_from_slice(&yuv_to_rgb(y, data[pair + u_index], data[pair + v_index]));
        }
    }

    RgbImage::from_raw(frame.width, frame.height, out)
        .ok_or_else(|| ConversionError::Decode("RGB buffer size mismatch".to_string()))
}

fn convert_planar(frame: &CameraFrame) -> Result<RgbImage, ConversionError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let y_stride = (frame.stride as usize).max(width);
    let planes = frame
        .yuv_planes
        .unwrap_or_else(|| YuvPlanes::planar(frame.height, y_stride as u32));
    let chroma_width = width.div_ceil(2);
    let chroma_rows = height.div_ceil(2);
    let u_stride = (planes.uv_stride as usize).max(chroma_width);
    let v_stride = (planes.v_stride as usize).max(chroma_width);

    ensure_len(&frame.data, required_len(0, y_stride, height, width))?;
    ensure_len(
        &frame.data,
        required_len(planes.uv_offset, u_stride, chroma_rows, chroma_width),
    )?;
    ensure_len(
        &frame.data,
        required_len(planes.v_offset, v_stride, chroma_rows, chroma_width),
    )?;

    let data = &frame.data;
    let mut out = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let y_row = &data[row * y_stride..row * y_stride + width];
        let u_start = planes.uv_offset + (row / 2) * u_stride;
        let v_start = planes.v_offset + (row / 2) * v_stride;
        for (col, &y) in y_row.iter().enumerate() {
            out.extend_from_slice(&yuv_to_rgb(
                y,
                data[u_start + col / 2],
                data[v_start + col / 2],
            ));
        }
    }

    RgbImage::from_raw(frame.width, frame.height, out)
        .ok_or_else(|| ConversionError::Decode("RGB buffer size mismatch".to_string()))
}

fn convert_packed_yuv(frame: &CameraFrame) -> Result<RgbImage, ConversionError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let bpp = frame.format.bytes_per_pixel().unwrap_or(2);
    // Pixels come in pairs sharing one U and one V sample
    let row_bytes = width.div_ceil(2) * 2 * bpp;
    let stride = (frame.stride as usize).max(row_bytes);
    ensure_len(&frame.data, required_len(0, stride, height, row_bytes))?;

    // Byte positions of Y0, U, Y1, V inside each 4-byte group
    let (y0, u, y1, v) = match frame.format {
        PixelFormat::UYVY => (1, 0, 3, 2),
        _ => (0, 1, 2, 3),
    };

    let mut out = Vec::with_capacity(width * height * 3);
    for row in frame.data.chunks(stride).take(height) {
        for (pair, group) in row[..row_bytes].chunks_exact(4).enumerate() {
            out.extend_from_slice(&yuv_to_rgb(group[y0], group[u], group[v]));
            if pair * 2 + 1 < width {
                out.extend_from_slice(&yuv_to_rgb(group[y1], group[u], group[v]));
            }
        }
    }

    RgbImage::from_raw(frame.width, frame.height, out)
        .ok_or_else(|| ConversionError::Decode("RGB buffer size mismatch".to_string()))
}

/// BT.601 luma of an RGB bitmap, the input the detectors work on
pub fn rgb_to_luma(image: &RgbImage) -> GrayImage {
    let mut luma = GrayImage::new(image.width(), image.height());
    for (dst, src) in luma.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = src.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        dst.0 = [y.round().clamp(0.0, 255.0) as u8];
    }
    luma
}

/// Shrink an image so its largest side is at most `max_dimension`
///
/// Returns the image and the factor applied to coordinates (1.0 when the
/// image already fits or `max_dimension` is zero).
pub fn downscale_to_fit(image: &GrayImage, max_dimension: u32) -> (GrayImage, f32) {
    let largest = image.width().max(image.height());
    if max_dimension == 0 || largest <= max_dimension {
        return (image.clone(), 1.0);
    }

    let scale = max_dimension as f32 / largest as f32;
    let width = ((image.width() as f32 * scale).round() as u32).max(1);
    let height = ((image.height() as f32 * scale).round() as u32).max(1);
    debug!(
        from_width = image.width(),
        from_height = image.height(),
        width,
        height,
        "Downscaling analysis frame"
    );
    (
        imageops::resize(image, width, height, imageops::FilterType::Triangle),
        scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_yuv_neutral_chroma_is_gray() {
        assert_eq!(yuv_to_rgb(128, 128, 128), [128, 128, 128]);
        assert_eq!(yuv_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(255, 128, 128), [255, 255, 255]);
        // Strong V pushes red up and clamps
        assert_eq!(yuv_to_rgb(200, 128, 255)[0], 255);
    }

    #[test]
    fn test_nv12_and_nv21_swap_chroma() {
        // 2x2 Y plane followed by one UV pair
        let nv12 = CameraFrame::new(2, 2, vec![100, 100, 100, 100, 90, 200], PixelFormat::NV12);
        let nv21 = CameraFrame::new(2, 2, vec![100, 100, 100, 100, 200, 90], PixelFormat::NV21);

        let a = frame_to_rgb(&nv12).unwrap();
        let b = frame_to_rgb(&nv21).unwrap();
        assert_eq!(a.get_pixel(0, 0), b.get_pixel(1, 1));
        assert_eq!(*a.get_pixel(0, 0), Rgb(yuv_to_rgb(100, 90, 200)));
    }

    #[test]
    fn test_i420_uses_separate_planes() {
        // 2x2: Y(4) U(1) V(1)
        let frame = CameraFrame::new(2, 2, vec![50, 60, 70, 80, 100, 180], PixelFormat::I420);
        let rgb = frame_to_rgb(&frame).unwrap();
        assert_eq!(*rgb.get_pixel(1, 1), Rgb(yuv_to_rgb(80, 100, 180)));
    }

    #[test]
    fn test_yuyv_and_uyvy_order() {
        let yuyv = CameraFrame::new(2, 1, vec![10, 120, 240, 140], PixelFormat::YUYV);
        let uyvy = CameraFrame::new(2, 1, vec![120, 10, 140, 240], PixelFormat::UYVY);
        let a = frame_to_rgb(&yuyv).unwrap();
        let b = frame_to_rgb(&uyvy).unwrap();
        assert_eq!(a, b);
        assert_eq!(*a.get_pixel(1, 0), Rgb(yuv_to_rgb(240, 120, 140)));
    }

    #[test]
    fn test_bgra_with_stride_padding() {
        // 1x2 BGRA with 8-byte stride (4 bytes padding per row)
        let data = vec![1, 2, 3, 255, 0, 0, 0, 0, 4, 5, 6, 255];
        let mut frame = CameraFrame::new(1, 2, data, PixelFormat::BGRA);
        frame.stride = 8;
        let rgb = frame_to_rgb(&frame).unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([3, 2, 1]));
        assert_eq!(*rgb.get_pixel(0, 1), Rgb([6, 5, 4]));
    }

    #[test]
    fn test_rgb24_row_padding_is_checked() {
        // 2x2 RGB24 with 8-byte rows: the last row only needs 6 bytes
        let mut data = vec![0u8; 14];
        data[8..11].copy_from_slice(&[10, 20, 30]);
        let mut frame = CameraFrame::new(2, 2, data, PixelFormat::RGB24);
        frame.stride = 8;
        let rgb = frame_to_rgb(&frame).unwrap();
        assert_eq!(*rgb.get_pixel(0, 1), Rgb([10, 20, 30]));

        let mut frame = CameraFrame::new(2, 2, vec![0u8; 13], PixelFormat::RGB24);
        frame.stride = 8;
        assert_eq!(
            frame_to_rgb(&frame),
            Err(ConversionError::BufferTooSmall {
                expected: 14,
                actual: 13
            })
        );
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let frame = CameraFrame::new(3, 1, vec![0, 128, 255], PixelFormat::Gray8)
            .with_rotation(SensorRotation::Rotate90);
        let rgb = frame_to_rgb(&frame).unwrap();
        assert_eq!(rgb.dimensions(), (1, 3));
        // Rotating clockwise moves the left pixel to the top
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(0, 2), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_jpeg_plane_decodes() {
        let source = RgbImage::from_pixel(16, 8, Rgb([240, 240, 240]));
        let mut bytes = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode_image(&source)
            .unwrap();

        let frame = CameraFrame::new(16, 8, bytes, PixelFormat::Jpeg)
            .with_rotation(SensorRotation::Rotate270);
        let rgb = frame_to_rgb(&frame).unwrap();
        assert_eq!(rgb.dimensions(), (8, 16));
    }

    #[test]
    fn test_errors() {
        let frame = CameraFrame::new(0, 4, vec![], PixelFormat::RGB24);
        assert_eq!(
            frame_to_rgb(&frame),
            Err(ConversionError::InvalidDimensions {
                width: 0,
                height: 4
            })
        );

        let frame = CameraFrame::new(4, 4, vec![0u8; 10], PixelFormat::NV12);
        assert!(matches!(
            frame_to_rgb(&frame),
            Err(ConversionError::BufferTooSmall { .. })
        ));

        let frame = CameraFrame::new(4, 4, vec![1, 2, 3], PixelFormat::Jpeg);
        assert!(matches!(frame_to_rgb(&frame), Err(ConversionError::Decode(_))));
    }

    #[test]
    fn test_luma_and_downscale() {
        let rgb = RgbImage::from_pixel(4, 2, Rgb([255, 0, 0]));
        let luma = rgb_to_luma(&rgb);
        assert_eq!(luma.get_pixel(0, 0).0, [76]);

        let big = GrayImage::new(1280, 720);
        let (small, scale) = downscale_to_fit(&big, 640);
        assert_eq!(small.dimensions(), (640, 360));
        assert!((scale - 0.5).abs() < f32::EPSILON);

        let (same, scale) = downscale_to_fit(&small, 0);
        assert_eq!(same.dimensions(), (640, 360));
        assert_eq!(scale, 1.0);
    }

    #[tokio::test]
    async fn test_async_conversion() {
        let frame = Arc::new(CameraFrame::new(1, 1, vec![9, 8, 7], PixelFormat::RGB24));
        let rgb = frame_to_rgb_async(frame).await.unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([9, 8, 7]));
    }
}
