// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scan result storage layout
pub mod storage {
    /// Folder created under the base directory for all scan results
    pub const APP_FOLDER: &str = "BarcodeScanner";

    /// Timestamp layout used for folder and file names (`yyyyMMdd_HHmmss`)
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Length of the date part of a timestamp (`yyyyMMdd`)
    pub const DATE_FOLDER_LEN: usize = 8;

    /// Extension of the decoded text file
    pub const TEXT_EXTENSION: &str = "txt";

    /// Extension of the annotated image file
    pub const IMAGE_EXTENSION: &str = "jpg";

    /// Upper bound on ` (n)` suffixes tried before giving up on a free name
    pub const MAX_NAME_SUFFIX: u32 = 999;
}

/// Annotation drawn on saved images
pub mod annotation {
    /// Detection frame colour (RGBA): green at 60% opacity
    pub const FRAME_COLOR: [u8; 4] = [0, 255, 0, 153];

    /// Detection frame stroke width in pixels
    pub const FRAME_STROKE_WIDTH: u32 = 8;

    /// Height of the saved image in pixels
    pub const OUTPUT_HEIGHT: u32 = 1024;

    /// JPEG quality of the saved image
    pub const JPEG_QUALITY: u8 = 95;
}

/// Barcode detection tuning
pub mod detection {
    /// Maximum number of rows sampled by the linear scanline decoder
    pub const MAX_SCAN_ROWS: u32 = 64;

    /// Rows a linear barcode must be decoded on before it is reported
    pub const MIN_ROW_HITS: u32 = 2;

    /// Minimum luminance spread for a row to be considered
    pub const MIN_ROW_CONTRAST: u8 = 40;

    /// Analysis frames are downscaled to this size (largest dimension)
    pub const ANALYSIS_MAX_DIMENSION: u32 = 640;
}

/// Camera timing
pub mod timing {
    use super::Duration;

    /// Frames captured during warm-up are discarded
    pub const WARMUP: Duration = Duration::from_millis(500);

    /// Default interval between analysis frames in watch mode
    pub const ANALYSIS_INTERVAL: Duration = Duration::from_millis(200);

    /// Poll interval of the CLI while waiting for results or Ctrl+C
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
}

/// Supported image files for the file backend
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Extensions delivered as undecoded JPEG frames
    pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

    /// Check if extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }

    /// Check if extension is a JPEG file
    pub fn is_jpeg_extension(ext: &str) -> bool {
        JPEG_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("PNG"));
        assert!(file_formats::is_image_extension("jpeg"));
        assert!(!file_formats::is_image_extension("mp4"));
        assert!(file_formats::is_jpeg_extension("JPG"));
        assert!(!file_formats::is_jpeg_extension("png"));
    }

    #[test]
    fn test_timestamp_format_matches_date_folder_len() {
        let sample = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap()
            .format(storage::TIMESTAMP_FORMAT)
            .to_string();
        assert_eq!(sample, "20240102_030405");
        assert_eq!(&sample[..storage::DATE_FOLDER_LEN], "20240102");
    }
}
