// SPDX-License-Identifier: MPL-2.0

//! Media processing utilities
//!
//! # Color Space Conversion
//!
//! Camera frames arrive either as a compressed JPEG plane or in one of the raw
//! YUV layouts (NV12, NV21, I420, YUYV, UYVY). The [`conversion`] module turns
//! both into upright RGB bitmaps and derives the luma images the barcode
//! detectors consume.

pub mod conversion;

pub use conversion::{downscale_to_fit, frame_to_rgb, frame_to_rgb_async, rgb_to_luma};
