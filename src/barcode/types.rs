// SPDX-License-Identifier: MPL-2.0

//! Types shared by barcode detectors and their consumers

use serde::{Deserialize, Serialize};

/// Barcode symbologies the scanner understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    QrCode,
    Ean13,
    Ean8,
    UpcA,
    Code128,
    Code39,
}

impl BarcodeFormat {
    /// Every supported format, 2D first
    pub const ALL: [BarcodeFormat; 6] = [
        BarcodeFormat::QrCode,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::UpcA,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
    ];

    /// Human readable type name, as written to saved scan results
    pub fn display_name(&self) -> &'static str {
        match self {
            BarcodeFormat::QrCode => "QR Code",
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::Code128 => "CODE-128",
            BarcodeFormat::Code39 => "CODE-39",
        }
    }

    /// Whether the symbology is a 2D matrix code
    pub fn is_two_dimensional(&self) -> bool {
        matches!(self, BarcodeFormat::QrCode)
    }

    /// Parse a user supplied name such as `qr`, `ean-13` or `CODE128`
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "qr" | "qrcode" => Some(BarcodeFormat::QrCode),
            "ean13" => Some(BarcodeFormat::Ean13),
            "ean8" => Some(BarcodeFormat::Ean8),
            "upca" | "upc" => Some(BarcodeFormat::UpcA),
            "code128" => Some(BarcodeFormat::Code128),
            "code39" => Some(BarcodeFormat::Code39),
            _ => None,
        }
    }
}

impl std::fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Normalized region within a frame
///
/// All values are in the range 0.0 to 1.0, relative to frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        if frame_width == 0 || frame_height == 0 {
            return Self::default();
        }
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }
}

/// Axis aligned rectangle in pixel coordinates
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    /// Create a box, swapping edges given in the wrong order
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Smallest box containing every point
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(
            min_x.floor() as i32,
            min_y.floor() as i32,
            max_x.ceil() as i32 + 1,
            max_y.ceil() as i32 + 1,
        ))
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Check whether two boxes share any pixel
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Multiply every edge by `factor`
    pub fn scaled(&self, factor: f32) -> BoundingBox {
        BoundingBox::new(
            (self.left as f32 * factor).floor() as i32,
            (self.top as f32 * factor).floor() as i32,
            (self.right as f32 * factor).ceil() as i32,
            (self.bottom as f32 * factor).ceil() as i32,
        )
    }

    /// Restrict the box to a `width` x `height` image
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (width as i32, height as i32);
        BoundingBox {
            left: self.left.clamp(0, w),
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
        }
    }

    /// Express the box relative to a `frame_width` x `frame_height` frame
    pub fn to_region(&self, frame_width: u32, frame_height: u32) -> FrameRegion {
        let clamped = self.clamp_to(frame_width, frame_height);
        FrameRegion::from_pixels(
            clamped.left as u32,
            clamped.top as u32,
            clamped.width().max(0) as u32,
            clamped.height().max(0) as u32,
            frame_width,
            frame_height,
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// A decoded barcode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Barcode {
    pub format: BarcodeFormat,
    /// Decoded payload
    pub raw_value: String,
    /// Location in the analysed image, when the detector reports one
    pub bounding_box: Option<BoundingBox>,
    /// Corner points clockwise from top-left (empty for linear codes)
    pub corner_points: Vec<Point>,
}

impl Barcode {
    pub fn new(format: BarcodeFormat, raw_value: impl Into<String>) -> Self {
        Self {
            format,
            raw_value: raw_value.into(),
            bounding_box: None,
            corner_points: Vec::new(),
        }
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    /// Set corner points and derive the bounding box from them
    pub fn with_corner_points(mut self, points: Vec<Point>) -> Self {
        if let Some(bounds) = BoundingBox::from_points(&points) {
            self.bounding_box = Some(bounds);
        }
        self.corner_points = points;
        self
    }

    /// Map coordinates found on a downscaled image back to the source image
    pub fn rescaled(mut self, factor: f32, width: u32, height: u32) -> Self {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        self.bounding_box = self
            .bounding_box
            .map(|b| b.scaled(factor).clamp_to(width, height));
        for p in &mut self.corner_points {
            p.x *= factor;
            p.y *= factor;
        }
        self
    }
}
