// SPDX-License-Identifier: MPL-2.0

//! End-to-end tests: image file as camera, detection, scan and save

use barcode_scanner::backends::camera::{CameraBackendManager, FileBackend, select_still_format};
use barcode_scanner::barcode::{BarcodeFormat, BarcodeProcessor, ProcessorOptions};
use barcode_scanner::media::frame_to_rgb;
use barcode_scanner::{ScanController, ScanResultStorage, ScanTimestamp, SessionMode};
use image::{GrayImage, Luma};
use std::path::PathBuf;

const L: [&str; 10] = [
    "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
    "0110111", "0001011",
];
const PARITY: [&str; 10] = [
    "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG", "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL",
    "LGGLGL",
];

/// Module pattern of an EAN-13, `1` for bars
fn ean13_modules(digits: &str) -> String {
    let d: Vec<usize> = digits.bytes().map(|b| (b - b'0') as usize).collect();
    let mut out = String::from("101");
    for (i, &digit) in d[1..7].iter().enumerate() {
        let l = L[digit];
        if PARITY[d[0]].as_bytes()[i] == b'G' {
            // G pattern: complement of L, reversed
            out.extend(l.chars().rev().map(|c| if c == '1' { '0' } else { '1' }));
        } else {
            out.push_str(l);
        }
    }
    out.push_str("01010");
    for &digit in &d[7..] {
        out.extend(L[digit].chars().map(|c| if c == '1' { '0' } else { '1' }));
    }
    out.push_str("101");
    out
}

fn render(modules: &str, module: u32, quiet: u32, height: u32) -> GrayImage {
    let width = (modules.len() as u32 + 2 * quiet) * module;
    GrayImage::from_fn(width, height, |x, _| {
        let m = (x / module) as i64 - quiet as i64;
        let bar = m >= 0
            && (m as usize) < modules.len()
            && modules.as_bytes()[m as usize] == b'1';
        if bar { Luma([20]) } else { Luma([235]) }
    })
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("barcode-pipeline-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_encoder_produces_95_modules() {
    assert_eq!(ean13_modules("4006381333931").len(), 95);
}

#[test]
fn test_jpeg_capture_is_detected() {
    let dir = temp_dir();
    let path = dir.join("label.jpg");
    render(&ean13_modules("5901234123457"), 4, 12, 200)
        .save(&path)
        .unwrap();

    let camera = CameraBackendManager::with_backend(Box::new(FileBackend::with_sources(vec![
        path.clone(),
    ])));
    let device = FileBackend::device_for(&path);
    let format = select_still_format(&camera.get_formats(&device)).unwrap();
    assert_eq!(format.pixel_format, "MJPG");

    camera.start_camera(&device, &format).unwrap();
    let frame = camera.take_picture().unwrap();
    camera.stop_camera().unwrap();

    let image = frame_to_rgb(&frame).unwrap();
    let processor = BarcodeProcessor::new();
    let barcode = processor.scan_barcode(&image).unwrap();
    assert_eq!(barcode.format, BarcodeFormat::Ean13);
    assert_eq!(barcode.raw_value, "5901234123457");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_disabled_format_is_not_reported() {
    let image = image::DynamicImage::ImageLuma8(render(&ean13_modules("4006381333931"), 2, 12, 60))
        .to_rgb8();
    let processor = BarcodeProcessor::with_options(ProcessorOptions {
        formats: vec![BarcodeFormat::QrCode, BarcodeFormat::Code128],
        ..ProcessorOptions::default()
    });
    assert!(processor.detect_barcodes(&image).is_empty());
}

#[tokio::test]
async fn test_scan_workflow_saves_result() {
    let dir = temp_dir();
    let path = dir.join("label.png");
    render(&ean13_modules("4006381333931"), 3, 12, 150)
        .save(&path)
        .unwrap();

    let camera = CameraBackendManager::with_backend(Box::new(FileBackend::with_sources(vec![
        path.clone(),
    ])));
    let device = FileBackend::device_for(&path);
    let format = select_still_format(&camera.get_formats(&device)).unwrap();
    let storage = ScanResultStorage::new().with_base_dir(dir.join("Downloads"));
    let mut controller = ScanController::new(camera, BarcodeProcessor::new(), storage);

    controller.start_camera(&device, &format).unwrap();
    controller.shutter().await.unwrap();
    assert_eq!(controller.session().mode(), SessionMode::Captured);

    let barcodes = controller.detect().await.unwrap();
    assert_eq!(barcodes.len(), 1);
    assert!(controller.select(0));

    let (code, code_type) = controller.scan().unwrap();
    assert_eq!((code.as_str(), code_type.as_str()), ("4006381333931", "EAN-13"));

    let saved = controller.save().await.unwrap();
    let timestamp: &ScanTimestamp = controller.session().timestamp().unwrap();
    assert_eq!(
        saved.message(),
        format!("Saved: BarcodeScanner/{}/", timestamp.date_folder())
    );

    let text = std::fs::read_to_string(&saved.text_path).unwrap();
    assert_eq!(
        text,
        format!(
            "Type: EAN-13\nContent: 4006381333931\nTimestamp: {}",
            timestamp
        )
    );
    let saved_image = image::open(&saved.image_path).unwrap();
    assert_eq!(saved_image.height(), 1024);

    drop(controller);
    let _ = std::fs::remove_dir_all(&dir);
}
