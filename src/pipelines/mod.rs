// SPDX-License-Identifier: MPL-2.0

//! Image pipelines for saved scan results
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Captured RGB │ ──▶ │  annotate         │ ──▶ │  encoding    │ ──▶ JPEG bytes
//! │   bitmap     │     │  - detection box  │     │  - quality   │
//! │              │     │  - resize         │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! Every step is a plain function; the async variants move the CPU-bound
//! work to the tokio blocking pool.
//!
//! - [`annotate`]: detection frame drawing and output resizing
//! - [`encoding`]: JPEG encoding

pub mod annotate;
pub mod encoding;

pub use annotate::{
    AnnotationStyle, annotate, annotate_async, draw_detection_frame, resize_to_height,
};
pub use encoding::{EncodedImage, ResultEncoder, encode_jpeg};
