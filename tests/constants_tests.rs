// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use barcode_scanner::constants::{annotation, detection, storage, timing};

#[test]
fn test_timestamp_layout_matches_date_folder() {
    let formatted = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(7, 5, 1))
        .map(|t| t.format(storage::TIMESTAMP_FORMAT).to_string())
        .unwrap();
    assert_eq!(formatted, "20240309_070501");
    assert_eq!(&formatted[..storage::DATE_FOLDER_LEN], "20240309");
}

#[test]
fn test_annotation_defaults() {
    // Green at 60% opacity
    assert_eq!(annotation::FRAME_COLOR, [0, 255, 0, 153]);
    assert_eq!(annotation::FRAME_STROKE_WIDTH, 8);
    assert_eq!(annotation::OUTPUT_HEIGHT, 1024);
    assert_eq!(annotation::JPEG_QUALITY, 95);
}

#[test]
fn test_detection_tuning_is_sane() {
    assert!(detection::MIN_ROW_HITS >= 1);
    assert!(detection::MIN_ROW_HITS <= detection::MAX_SCAN_ROWS);
    assert!(detection::ANALYSIS_MAX_DIMENSION > 0);
}

#[test]
fn test_poll_interval_shorter_than_analysis_interval() {
    assert!(timing::POLL_INTERVAL < timing::ANALYSIS_INTERVAL);
}
