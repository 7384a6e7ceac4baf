// SPDX-License-Identifier: GPL-3.0-only

//! Linear barcode detection
//!
//! Rows of the image are sampled at regular intervals and binarized with a
//! per-row midpoint threshold. Each row becomes a list of alternating
//! light/dark run widths, which the symbology decoders try at every bar, in
//! both reading directions. Reads from different rows are merged: a barcode
//! is reported once the same value was found on enough rows, and its box
//! spans every row it was read on.

mod code128;
mod code39;
mod ean;

use super::BarcodeDetector;
use crate::barcode::types::{Barcode, BarcodeFormat, BoundingBox};
use crate::constants::detection;
use crate::errors::DetectionError;
use image::GrayImage;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Light margin required around a symbol, in modules
const QUIET_ZONE_MODULES: f32 = 5.0;

/// Result of a symbology decoder
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Decoded {
    pub format: BarcodeFormat,
    pub text: String,
    /// Number of runs the symbol covers, starting at its first bar
    pub runs: usize,
    /// Estimated module width in pixels
    pub module: f32,
}

/// Average deviation of `counters` from `pattern`, relative to the total
/// width; infinite when a single element is too far off
pub(super) fn pattern_variance(counters: &[u32], pattern: &[u32], max_individual: f32) -> f32 {
    let total: u32 = counters.iter().sum();
    let pattern_len: u32 = pattern.iter().sum();
    if total < pattern_len {
        return f32::INFINITY;
    }

    let unit = total as f32 / pattern_len as f32;
    let max_individual = max_individual * unit;
    let mut variance = 0.0;
    for (&counter, &expected) in counters.iter().zip(pattern) {
        let deviation = (counter as f32 - expected as f32 * unit).abs();
        if deviation > max_individual {
            return f32::INFINITY;
        }
        variance += deviation;
    }
    variance / total as f32
}

type DecodeFn = fn(&[u32], usize) -> Option<Decoded>;

/// Decoders in the order they are tried, with the formats each can produce
const SYMBOLOGIES: [(&[BarcodeFormat], DecodeFn); 4] = [
    (&[BarcodeFormat::Ean13, BarcodeFormat::UpcA], ean::decode_ean13),
    (&[BarcodeFormat::Ean8], ean::decode_ean8),
    (&[BarcodeFormat::Code128], code128::decode),
    (&[BarcodeFormat::Code39], code39::decode),
];

/// Alternating light/dark runs of one binarized row
#[derive(Debug, Clone)]
struct Runs {
    widths: Vec<u32>,
    /// Pixel span `[start, end)` of each run in row coordinates
    spans: Vec<(usize, usize)>,
    first_dark: bool,
}

impl Runs {
    /// Binarize a row; `None` when it has too little contrast
    fn from_row(row: &[u8], min_contrast: u8) -> Option<Self> {
        let (min, max) = row
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if row.is_empty() || max.saturating_sub(min) < min_contrast {
            return None;
        }
        let threshold = ((min as u16 + max as u16) / 2) as u8;

        let mut widths = Vec::new();
        let mut spans = Vec::new();
        let first_dark = row[0] <= threshold;
        let mut dark = first_dark;
        let mut start = 0;
        for (x, &v) in row.iter().enumerate().skip(1) {
            let is_dark = v <= threshold;
            if is_dark != dark {
                widths.push((x - start) as u32);
                spans.push((start, x));
                start = x;
                dark = is_dark;
            }
        }
        widths.push((row.len() - start) as u32);
        spans.push((start, row.len()));

        Some(Self {
            widths,
            spans,
            first_dark,
        })
    }

    fn len(&self) -> usize {
        self.widths.len()
    }

    fn is_bar(&self, index: usize) -> bool {
        (index % 2 == 0) == self.first_dark
    }

    /// The same runs read right to left
    fn reversed(&self) -> Self {
        let last_dark = self.is_bar(self.len() - 1);
        Self {
            widths: self.widths.iter().rev().copied().collect(),
            spans: self.spans.iter().rev().copied().collect(),
            first_dark: last_dark,
        }
    }

    /// Pixel extent `[left, right)` of runs `from..to`
    fn extent(&self, from: usize, to: usize) -> (usize, usize) {
        let a = self.spans[from];
        let b = self.spans[to - 1];
        (a.0.min(b.0), a.1.max(b.1))
    }

    /// Check the light margins on both sides of runs `from..to`
    fn has_quiet_zones(&self, from: usize, to: usize, module: f32) -> bool {
        let needed = module * QUIET_ZONE_MODULES;
        let before = from == 0 || self.widths[from - 1] as f32 >= needed;
        let after = to >= self.len() || self.widths[to] as f32 >= needed;
        before && after
    }
}

/// One decoded read on a single row
#[derive(Debug, Clone, PartialEq)]
pub struct RowHit {
    pub format: BarcodeFormat,
    pub text: String,
    /// Pixel span `[left, right)` of the symbol on the row
    pub left: usize,
    pub right: usize,
}

/// Reads of the same barcode across rows
#[derive(Debug)]
struct Candidate {
    format: BarcodeFormat,
    text: String,
    left: usize,
    right: usize,
    rows: BTreeSet<u32>,
}

impl Candidate {
    fn overlaps(&self, hit: &RowHit) -> bool {
        self.format == hit.format
            && self.text == hit.text
            && hit.left < self.right
            && self.left < hit.right
    }

    fn bounding_box(&self, margin: i32, width: u32, height: u32) -> BoundingBox {
        let top = self.rows.first().copied().unwrap_or(0) as i32;
        let bottom = self.rows.last().copied().unwrap_or(0) as i32 + 1;
        BoundingBox::new(
            self.left as i32,
            top - margin,
            self.right as i32,
            bottom + margin,
        )
        .clamp_to(width, height)
    }
}

/// Scanline decoder for EAN-13, UPC-A, EAN-8, Code 128 and Code 39
#[derive(Debug, Clone)]
pub struct LinearDetector {
    formats: Vec<BarcodeFormat>,
    max_rows: u32,
    min_row_hits: u32,
    min_contrast: u8,
}

impl Default for LinearDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearDetector {
    /// Detector for every linear format
    pub fn new() -> Self {
        Self::with_formats(&BarcodeFormat::ALL)
    }

    /// Detector restricted to the linear formats in `formats`
    pub fn with_formats(formats: &[BarcodeFormat]) -> Self {
        let mut formats: Vec<BarcodeFormat> = formats
            .iter()
            .copied()
            .filter(|f| !f.is_two_dimensional())
            .collect();
        formats.sort_unstable();
        formats.dedup();
        Self {
            formats,
            max_rows: detection::MAX_SCAN_ROWS,
            min_row_hits: detection::MIN_ROW_HITS,
            min_contrast: detection::MIN_ROW_CONTRAST,
        }
    }

    /// Number of rows sampled per image
    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    /// Rows a value must be read on before it is reported
    pub fn with_min_row_hits(mut self, min_row_hits: u32) -> Self {
        self.min_row_hits = min_row_hits.max(1);
        self
    }

    /// Minimum luminance spread for a row to be decoded
    pub fn with_min_contrast(mut self, min_contrast: u8) -> Self {
        self.min_contrast = min_contrast;
        self
    }

    fn enabled(&self, format: BarcodeFormat) -> bool {
        self.formats.contains(&format)
    }

    fn decode_at(&self, runs: &Runs, index: usize) -> Option<Decoded> {
        SYMBOLOGIES
            .iter()
            .filter(|(formats, _)| formats.iter().any(|f| self.enabled(*f)))
            .find_map(|(_, decode)| {
                decode(&runs.widths, index).filter(|d| {
                    self.enabled(d.format)
                        && runs.has_quiet_zones(index, index + d.runs, d.module)
                })
            })
    }

    fn scan_runs(&self, runs: &Runs, hits: &mut Vec<RowHit>) {
        let mut index = 0;
        while index < runs.len() {
            if !runs.is_bar(index) {
                index += 1;
                continue;
            }
            match self.decode_at(runs, index) {
                Some(decoded) => {
                    let (left, right) = runs.extent(index, index + decoded.runs);
                    hits.push(RowHit {
                        format: decoded.format,
                        text: decoded.text,
                        left,
                        right,
                    });
                    index += decoded.runs;
                }
                None => index += 1,
            }
        }
    }

    /// Decode every symbol on one row of luminance values
    pub fn scan_row(&self, row: &[u8]) -> Vec<RowHit> {
        let Some(runs) = Runs::from_row(row, self.min_contrast) else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        self.scan_runs(&runs, &mut hits);
        self.scan_runs(&runs.reversed(), &mut hits);
        hits
    }
}

impl BarcodeDetector for LinearDetector {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn formats(&self) -> &[BarcodeFormat] {
        &self.formats
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Barcode>, DetectionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || self.formats.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.max_rows.clamp(1, height);
        let spacing = height as f32 / rows as f32;
        let required = self.min_row_hits.clamp(1, rows);
        let raw = image.as_raw();

        let mut candidates: Vec<Candidate> = Vec::new();
        for k in 0..rows {
            let y = (((k as f32 + 0.5) * spacing) as u32).min(height - 1);
            let offset = y as usize * width as usize;
            let row = &raw[offset..offset + width as usize];

            for hit in self.scan_row(row) {
                trace!(y, format = ?hit.format, text = %hit.text, "Row hit");
                match candidates.iter_mut().find(|c| c.overlaps(&hit)) {
                    Some(candidate) => {
                        candidate.left = candidate.left.min(hit.left);
                        candidate.right = candidate.right.max(hit.right);
                        candidate.rows.insert(y);
                    }
                    None => candidates.push(Candidate {
                        format: hit.format,
                        text: hit.text,
                        left: hit.left,
                        right: hit.right,
                        rows: BTreeSet::from([y]),
                    }),
                }
            }
        }

        // Most confirmed reads first; a weaker read overlapping one of them
        // is a misread of the same symbol
        let mut confirmed: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.rows.len() as u32 >= required)
            .collect();
        confirmed.sort_by(|a, b| b.rows.len().cmp(&a.rows.len()));

        let margin = (spacing / 2.0).ceil() as i32;
        let mut accepted: Vec<(BoundingBox, Candidate)> = Vec::new();
        for candidate in confirmed {
            let bounds = candidate.bounding_box(margin, width, height);
            if accepted.iter().any(|(b, _)| b.intersects(&bounds)) {
                debug!(
                    text = %candidate.text,
                    rows = candidate.rows.len(),
                    "Dropping overlapping read"
                );
                continue;
            }
            accepted.push((bounds, candidate));
        }
        accepted.sort_by_key(|(b, _)| (b.top, b.left));

        let barcodes: Vec<Barcode> = accepted
            .into_iter()
            .map(|(bounds, c)| {
                debug!(
                    format = %c.format,
                    content = %c.text,
                    rows = c.rows.len(),
                    bounds = %bounds,
                    "Detected linear barcode"
                );
                Barcode::new(c.format, c.text).with_bounding_box(bounds)
            })
            .collect();
        Ok(barcodes)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use image::{Luma, imageops};

    #[test]
    fn test_pattern_variance() {
        assert_eq!(pattern_variance(&[2, 4, 2], &[1, 2, 1], 0.7), 0.0);
        assert!(pattern_variance(&[2, 8, 2], &[1, 2, 1], 0.7).is_infinite());
        assert!(pattern_variance(&[1, 1], &[2, 2], 0.7).is_infinite());
    }

    #[test]
    fn test_runs_from_row() {
        let runs = Runs::from_row(&[255, 255, 0, 0, 0, 255], 40).unwrap();
        assert_eq!(runs.widths, vec![2, 3, 1]);
        assert!(!runs.first_dark);
        assert!(runs.is_bar(1));
        assert_eq!(runs.extent(1, 2), (2, 5));

        let reversed = runs.reversed();
        assert_eq!(reversed.widths, vec![1, 3, 2]);
        assert!(reversed.is_bar(1));
        assert_eq!(reversed.extent(0, 2), (2, 6));

        assert!(Runs::from_row(&[100, 120, 110], 40).is_none());
        assert!(Runs::from_row(&[], 0).is_none());
    }

    #[test]
    fn test_scan_row_reports_pixel_span() {
        let widths = scaled(&ean13_widths("4006381333931"), 2);
        let row = render_row(&widths, 30);
        let hits = LinearDetector::new().scan_row(&row);
        // Only the left to right reading passes the parity check
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "4006381333931");
        assert_eq!((hits[0].left, hits[0].right), (30, 30 + 95 * 2));

        let mut mirrored = row.clone();
        mirrored.reverse();
        let hits = LinearDetector::new().scan_row(&mirrored);
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].left, hits[0].right), (30, 30 + 95 * 2));
    }

    #[test]
    fn test_missing_quiet_zone_rejected() {
        let widths = scaled(&ean13_widths("4006381333931"), 2);
        // Dark noise bar close to the start guard
        let mut row = vec![255u8; 4];
        row.extend([0u8; 6]);
        row.extend(render_row(&widths, 4));
        assert!(LinearDetector::new().scan_row(&row).is_empty());
    }

    #[test]
    fn test_detect_ean13_image() {
        let widths = scaled(&ean13_widths("4006381333931"), 3);
        let image = render(&widths, 30, 60);
        let barcodes = LinearDetector::new().detect(&image).unwrap();

        assert_eq!(barcodes.len(), 1);
        let barcode = &barcodes[0];
        assert_eq!(barcode.format, BarcodeFormat::Ean13);
        assert_eq!(barcode.raw_value, "4006381333931");
        let bounds = barcode.bounding_box.unwrap();
        assert_eq!((bounds.left, bounds.right), (30, 30 + 95 * 3));
        assert_eq!((bounds.top, bounds.bottom), (0, 60));
    }

    #[test]
    fn test_detect_upside_down() {
        let widths = scaled(&ean13_widths("0036000291452"), 2);
        let image = imageops::rotate180(&render(&widths, 20, 40));
        let barcodes = LinearDetector::new().detect(&image).unwrap();
        assert_eq!(barcodes.len(), 1);
        assert_eq!(barcodes[0].format, BarcodeFormat::UpcA);
        assert_eq!(barcodes[0].raw_value, "036000291452");
    }

    #[test]
    fn test_detect_code128_and_code39_side_by_side() {
        let code128 = scaled(&code128_widths(&[104, 33, 34, 35]), 2);
        let code39 = code39_widths("AB1", 2, 5);

        let mut row = render_row(&code128, 40);
        row.extend(render_row(&code39, 40));
        let width = row.len() as u32;
        let image = GrayImage::from_fn(width, 30, |x, _| Luma([row[x as usize]]));

        let barcodes = LinearDetector::new().detect(&image).unwrap();
        let found: Vec<(BarcodeFormat, &str)> = barcodes
            .iter()
            .map(|b| (b.format, b.raw_value.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (BarcodeFormat::Code128, "ABC"),
                (BarcodeFormat::Code39, "AB1")
            ]
        );
    }

    #[test]
    fn test_min_row_hits() {
        let widths = scaled(&ean8_widths("96385074"), 2);
        let strip = render(&widths, 20, 1);
        let mut image = GrayImage::from_pixel(strip.width(), 32, Luma([255]));
        imageops::replace(&mut image, &strip, 0, 10);

        let detector = LinearDetector::new().with_max_rows(32);
        assert!(detector.detect(&image).unwrap().is_empty());

        let detector = detector.with_min_row_hits(1);
        let barcodes = detector.detect(&image).unwrap();
        assert_eq!(barcodes.len(), 1);
        assert_eq!(barcodes[0].raw_value, "96385074");
    }

    #[test]
    fn test_min_row_hits_clamped_to_rows() {
        let widths = scaled(&ean8_widths("96385074"), 2);
        let image = render(&widths, 20, 1);
        let barcodes = LinearDetector::new()
            .with_min_row_hits(5)
            .detect(&image)
            .unwrap();
        assert_eq!(barcodes.len(), 1);
    }

    #[test]
    fn test_low_contrast_and_disabled_formats() {
        let widths = scaled(&ean13_widths("4006381333931"), 2);
        let faint = render(&widths, 20, 20);
        let faint = GrayImage::from_fn(faint.width(), faint.height(), |x, y| {
            Luma([if faint.get_pixel(x, y).0[0] == 0 { 120 } else { 140 }])
        });
        assert!(LinearDetector::new().detect(&faint).unwrap().is_empty());

        let image = render(&widths, 20, 20);
        let detector = LinearDetector::with_formats(&[BarcodeFormat::Code128]);
        assert!(detector.detect(&image).unwrap().is_empty());
        assert_eq!(detector.formats(), &[BarcodeFormat::Code128]);
    }
}
