// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use barcode_scanner::backends::camera::CameraBackendType;
use barcode_scanner::{BarcodeFormat, Config};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.backend, CameraBackendType::File);
    assert_eq!(config.formats.len(), BarcodeFormat::ALL.len());
    assert_eq!(config.resize_height, 1024);
    assert_eq!(config.jpeg_quality, 95);
    assert!(config.output_dir.is_none());
}

#[test]
fn test_config_json_uses_snake_case_formats() {
    let config = Config {
        formats: vec![BarcodeFormat::QrCode, BarcodeFormat::Code128],
        ..Config::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains(r#""formats":["qr_code","code128"]"#), "{}", json);
}

#[test]
fn test_empty_object_is_default() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_storage_follows_output_dir() {
    let dir = std::env::temp_dir().join("barcode-config-output");
    let config = Config {
        output_dir: Some(dir.clone()),
        ..Config::default()
    };
    assert_eq!(config.storage().base_dir(), Some(dir.as_path()));
    assert_eq!(config.output_dir(), Some(dir));
}
