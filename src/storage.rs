// SPDX-License-Identifier: MPL-2.0

//! Scan result persistence
//!
//! A saved scan is a pair of files under
//! `<base>/BarcodeScanner/<yyyyMMdd>/`: `<HHmmss>.txt` with the decoded value
//! and `<HHmmss>.jpg` with the annotated capture. Existing files are never
//! overwritten; a ` (n)` suffix is added to both names instead.

use crate::barcode::BoundingBox;
use crate::constants::storage;
use crate::errors::StorageError;
use crate::pipelines::{AnnotationStyle, ResultEncoder, annotate};
use chrono::NaiveDateTime;
use image::RgbImage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Scan time in the `yyyyMMdd_HHmmss` layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanTimestamp(String);

impl ScanTimestamp {
    /// Current local time
    pub fn now() -> Self {
        Self(
            chrono::Local::now()
                .format(storage::TIMESTAMP_FORMAT)
                .to_string(),
        )
    }

    pub fn parse(value: &str) -> Result<Self, StorageError> {
        let well_formed = value.len() == storage::DATE_FOLDER_LEN + 7
            && value.as_bytes()[storage::DATE_FOLDER_LEN] == b'_'
            && NaiveDateTime::parse_from_str(value, storage::TIMESTAMP_FORMAT).is_ok();
        if well_formed {
            Ok(Self(value.to_string()))
        } else {
            Err(StorageError::InvalidTimestamp(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Date part, `yyyyMMdd`
    pub fn date_folder(&self) -> &str {
        &self.0[..storage::DATE_FOLDER_LEN]
    }

    /// Time part, `HHmmss`
    pub fn file_stem(&self) -> &str {
        &self.0[storage::DATE_FOLDER_LEN + 1..]
    }
}

impl std::fmt::Display for ScanTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ScanTimestamp {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Files written for one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScan {
    pub text_path: PathBuf,
    pub image_path: PathBuf,
    /// Folder relative to the base directory, `BarcodeScanner/<yyyyMMdd>/`
    pub folder: String,
}

impl SavedScan {
    /// Confirmation shown to the user
    pub fn message(&self) -> String {
        format!("Saved: {}", self.folder)
    }
}

/// Body of the text file
pub fn scan_text(scan_type: &str, scan_code: &str, timestamp: &ScanTimestamp) -> String {
    format!(
        "Type: {}\nContent: {}\nTimestamp: {}",
        scan_type, scan_code, timestamp
    )
}

/// Default base directory: the user's Downloads folder
pub fn default_base_dir() -> Option<PathBuf> {
    dirs::download_dir()
}

/// Writes scan results to a base directory
#[derive(Debug, Clone)]
pub struct ScanResultStorage {
    base_dir: Option<PathBuf>,
    style: AnnotationStyle,
    encoder: ResultEncoder,
}

impl Default for ScanResultStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanResultStorage {
    /// Storage under the Downloads folder with the default annotation
    pub fn new() -> Self {
        Self {
            base_dir: default_base_dir(),
            style: AnnotationStyle::default(),
            encoder: ResultEncoder::new(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.encoder = ResultEncoder::with_quality(quality);
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Annotate, encode and write one scan result
    pub fn save_scan_result(
        &self,
        image: &RgbImage,
        detection_box: Option<&BoundingBox>,
        scan_code: &str,
        scan_type: &str,
        timestamp: &ScanTimestamp,
    ) -> Result<SavedScan, StorageError> {
        let result = self.write_result(image, detection_box, scan_code, scan_type, timestamp);
        if let Err(e) = &result {
            error!(error = %e, "Failed to save scan result");
        }
        result
    }

    /// [`Self::save_scan_result`] on the blocking pool
    pub async fn save_scan_result_async(
        &self,
        image: Arc<RgbImage>,
        detection_box: Option<BoundingBox>,
        scan_code: String,
        scan_type: String,
        timestamp: ScanTimestamp,
    ) -> Result<SavedScan, StorageError> {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || {
            storage.save_scan_result(
                &image,
                detection_box.as_ref(),
                &scan_code,
                &scan_type,
                &timestamp,
            )
        })
        .await
        .map_err(|e| StorageError::WriteFailed(format!("save task error: {}", e)))?
    }

    fn write_result(
        &self,
        image: &RgbImage,
        detection_box: Option<&BoundingBox>,
        scan_code: &str,
        scan_type: &str,
        timestamp: &ScanTimestamp,
    ) -> Result<SavedScan, StorageError> {
        let base_dir = self
            .base_dir
            .as_ref()
            .ok_or(StorageError::NoOutputDirectory)?;

        let annotated = annotate(image, detection_box, &self.style)?;
        let encoded = self.encoder.encode_blocking(&annotated)?;

        let relative = Path::new(storage::APP_FOLDER).join(timestamp.date_folder());
        let folder = base_dir.join(&relative);
        std::fs::create_dir_all(&folder)?;

        let (text_path, image_path) = free_pair(&folder, timestamp.file_stem())?;
        debug!(text = %text_path.display(), image = %image_path.display(), "Writing scan result");

        write_new(&text_path, scan_text(scan_type, scan_code, timestamp).as_bytes())?;
        if let Err(e) = write_new(&image_path, &encoded.data) {
            let _ = std::fs::remove_file(&text_path);
            return Err(e);
        }

        info!(
            folder = %folder.display(),
            code = scan_code,
            scan_type,
            "Scan result saved"
        );
        Ok(SavedScan {
            text_path,
            image_path,
            folder: format!("{}/{}/", storage::APP_FOLDER, timestamp.date_folder()),
        })
    }
}

/// First `stem`, `stem (1)`, `stem (2)`... for which neither file exists
fn free_pair(folder: &Path, stem: &str) -> Result<(PathBuf, PathBuf), StorageError> {
    for n in 0..=storage::MAX_NAME_SUFFIX {
        let name = if n == 0 {
            stem.to_string()
        } else {
            format!("{} ({})", stem, n)
        };
        let text = folder.join(format!("{}.{}", name, storage::TEXT_EXTENSION));
        let image = folder.join(format!("{}.{}", name, storage::IMAGE_EXTENSION));
        if !text.exists() && !image.exists() {
            return Ok((text, image));
        }
    }
    Err(StorageError::WriteFailed(format!(
        "no free file name for {} in {}",
        stem,
        folder.display()
    )))
}

fn write_new(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| StorageError::WriteFailed(format!("{}: {}", path.display(), e)))?;
    file.write_all(data)?;
    file.flush()?;
    Ok(())
}
