// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config_dir>/barcode-scanner/config.json`. Missing
//! fields take their default values, so older files keep loading.

use crate::backends::camera::CameraBackendType;
use crate::barcode::{BarcodeFormat, ProcessorOptions};
use crate::constants::{annotation, detection, timing};
use crate::errors::{AppError, AppResult};
use crate::pipelines::AnnotationStyle;
use crate::storage::{ScanResultStorage, default_base_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the platform config directory
const CONFIG_DIR_NAME: &str = "barcode-scanner";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (image files or V4L2)
    pub backend: CameraBackendType,
    /// Last used camera device path
    pub last_camera_path: Option<String>,
    /// Base directory for scan results; the Downloads folder when unset
    pub output_dir: Option<PathBuf>,
    /// Height of saved images in pixels
    pub resize_height: u32,
    /// JPEG quality of saved images
    pub jpeg_quality: u8,
    /// Detection frame colour, RGBA
    pub frame_color: [u8; 4],
    /// Detection frame stroke width in pixels
    pub stroke_width: u32,
    /// Barcode formats to report
    pub formats: Vec<BarcodeFormat>,
    /// Analysis frames are downscaled to this size (0 disables)
    pub analysis_max_dimension: u32,
    /// Rows a linear barcode must be read on
    pub min_row_hits: u32,
    /// Camera warm-up before a still capture, in milliseconds
    pub warmup_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            last_camera_path: None,
            output_dir: None,
            resize_height: annotation::OUTPUT_HEIGHT,
            jpeg_quality: annotation::JPEG_QUALITY,
            frame_color: annotation::FRAME_COLOR,
            stroke_width: annotation::FRAME_STROKE_WIDTH,
            formats: BarcodeFormat::ALL.to_vec(),
            analysis_max_dimension: detection::ANALYSIS_MAX_DIMENSION,
            min_row_hits: detection::MIN_ROW_HITS,
            warmup_ms: timing::WARMUP.as_millis() as u64,
        }
    }
}

impl Config {
    /// Location of the configuration file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn require_path() -> AppResult<PathBuf> {
        Self::path().ok_or_else(|| AppError::Config("no configuration directory".to_string()))
    }

    /// Load the configuration, falling back to defaults when there is none
    pub fn load() -> AppResult<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!("{}: {}", path.display(), e)));
            }
        };
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save to the default location; returns the written path
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::require_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Overwrite the stored configuration with defaults
    pub fn reset() -> AppResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            color: self.frame_color,
            stroke_width: self.stroke_width,
            output_height: self.resize_height,
        }
    }

    /// Processor settings for still images (`analysis == false`) or
    /// continuous analysis frames
    pub fn processor_options(&self, analysis: bool) -> ProcessorOptions {
        let max_dimension = (analysis && self.analysis_max_dimension > 0)
            .then_some(self.analysis_max_dimension);
        ProcessorOptions {
            formats: self.formats.clone(),
            max_dimension,
            min_row_hits: self.min_row_hits,
        }
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_dir.clone().or_else(default_base_dir)
    }

    pub fn storage(&self) -> ScanResultStorage {
        let storage = ScanResultStorage::new()
            .with_style(self.annotation_style())
            .with_quality(self.jpeg_quality);
        match &self.output_dir {
            Some(dir) => storage.with_base_dir(dir),
            None => storage,
        }
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}
