// SPDX-License-Identifier: GPL-3.0-only

//! Annotation of captured images
//!
//! The saved image shows the selected barcode framed by a translucent
//! rectangle and is resized to a fixed height.

use crate::barcode::BoundingBox;
use crate::constants::annotation;
use crate::errors::StorageError;
use image::{Rgb, RgbImage, imageops};
use tracing::{debug, warn};

/// How the detection frame and output size look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationStyle {
    /// Frame colour, RGBA
    pub color: [u8; 4],
    /// Frame stroke width in pixels, centred on the box edge
    pub stroke_width: u32,
    /// Height of the output image
    pub output_height: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: annotation::FRAME_COLOR,
            stroke_width: annotation::FRAME_STROKE_WIDTH,
            output_height: annotation::OUTPUT_HEIGHT,
        }
    }
}

fn blend(pixel: &mut Rgb<u8>, color: [u8; 4]) {
    let alpha = color[3] as f32 / 255.0;
    for (channel, &c) in pixel.0.iter_mut().zip(color.iter()) {
        let mixed = *channel as f32 * (1.0 - alpha) + c as f32 * alpha;
        *channel = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

/// Draw a stroked rectangle around `bounds`
///
/// The stroke is centred on the rectangle outline, half inside and half
/// outside, and alpha-blended onto the image. Parts outside the image are
/// clipped.
pub fn draw_detection_frame(image: &mut RgbImage, bounds: &BoundingBox, style: &AnnotationStyle) {
    if style.stroke_width == 0 || style.color[3] == 0 || bounds.is_empty() {
        return;
    }
    let (width, height) = image.dimensions();
    let half = style.stroke_width as f32 / 2.0;

    let outer = (
        bounds.left as f32 - half,
        bounds.top as f32 - half,
        bounds.right as f32 + half,
        bounds.bottom as f32 + half,
    );
    let inner = (
        bounds.left as f32 + half,
        bounds.top as f32 + half,
        bounds.right as f32 - half,
        bounds.bottom as f32 - half,
    );

    let x0 = outer.0.floor().max(0.0) as u32;
    let y0 = outer.1.floor().max(0.0) as u32;
    let x1 = (outer.2.ceil().max(0.0) as u32).min(width);
    let y1 = (outer.3.ceil().max(0.0) as u32).min(height);

    for y in y0..y1 {
        let cy = y as f32 + 0.5;
        if cy < outer.1 || cy >= outer.3 {
            continue;
        }
        for x in x0..x1 {
            let cx = x as f32 + 0.5;
            if cx < outer.0 || cx >= outer.2 {
                continue;
            }
            let inside = cx >= inner.0 && cx < inner.2 && cy >= inner.1 && cy < inner.3;
            if !inside {
                blend(image.get_pixel_mut(x, y), style.color);
            }
        }
    }
}

/// Resize to `target_height`, keeping the aspect ratio
///
/// The width is the truncated product of the height and the aspect ratio.
pub fn resize_to_height(image: &RgbImage, target_height: u32) -> Result<RgbImage, StorageError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || target_height == 0 {
        return Err(StorageError::EncodingFailed(format!(
            "cannot resize {}x{} image to height {}",
            width, height, target_height
        )));
    }

    let aspect = width as f32 / height as f32;
    let target_width = ((target_height as f32 * aspect) as u32).max(1);
    if (target_width, target_height) == (width, height) {
        return Ok(image.clone());
    }

    debug!(width, height, target_width, target_height, "Resizing scan image");
    Ok(imageops::resize(
        image,
        target_width,
        target_height,
        imageops::FilterType::Triangle,
    ))
}

/// Frame the detection box and resize for saving
pub fn annotate(
    image: &RgbImage,
    bounds: Option<&BoundingBox>,
    style: &AnnotationStyle,
) -> Result<RgbImage, StorageError> {
    let mut framed = image.clone();
    match bounds {
        Some(bounds) => draw_detection_frame(&mut framed, bounds, style),
        None => warn!("No detection box, saving image without frame"),
    }
    resize_to_height(&framed, style.output_height)
}

/// [`annotate`] on the blocking pool
pub async fn annotate_async(
    image: std::sync::Arc<RgbImage>,
    bounds: Option<BoundingBox>,
    style: AnnotationStyle,
) -> Result<RgbImage, StorageError> {
    tokio::task::spawn_blocking(move || annotate(&image, bounds.as_ref(), &style))
        .await
        .map_err(|e| StorageError::EncodingFailed(format!("annotation task error: {}", e)))?
}
