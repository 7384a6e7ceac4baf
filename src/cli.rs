// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for barcode scanning
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Capturing, detecting, scanning and saving a barcode
//! - Watching a camera for barcodes until Ctrl+C

use barcode_scanner::backends::camera::{
    BackendError, CameraBackendManager, CameraBackendType, CameraDevice, CameraFormat,
    CaptureLoopController, FileBackend, LoopAction, select_still_format,
};
use barcode_scanner::barcode::{Barcode, BarcodeFormat, BarcodeProcessor};
use barcode_scanner::constants::timing;
use barcode_scanner::media::frame_to_rgb;
use barcode_scanner::{Config, SavedScan, ScanController};
use futures::channel::mpsc;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Where frames come from
#[derive(Debug, Clone, Default)]
pub struct Source {
    /// Image file or directory used as a camera
    pub input: Option<PathBuf>,
    /// Camera index from `list`
    pub camera: Option<usize>,
}

/// Options of the `scan` command
#[derive(Debug, Clone, Default)]
pub struct ScanArgs {
    pub source: Source,
    pub select: Option<usize>,
    pub no_save: bool,
    pub output: Option<PathBuf>,
    pub json: bool,
}

/// Apply command line overrides on top of the stored configuration
pub fn load_config(
    backend: Option<CameraBackendType>,
    formats: &[BarcodeFormat],
) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(backend) = backend {
        config.backend = backend;
    }
    if !formats.is_empty() {
        config.formats = formats.to_vec();
    }
    debug!(?config, "Configuration loaded");
    Ok(config)
}

fn backend_manager(config: &Config) -> Result<CameraBackendManager, BackendError> {
    match config.backend {
        CameraBackendType::File => {
            let sources = config.last_camera_path.iter().map(PathBuf::from).collect();
            Ok(CameraBackendManager::with_backend(Box::new(
                FileBackend::with_sources(sources),
            )))
        }
        #[cfg(feature = "v4l2")]
        CameraBackendType::V4l2 => Ok(CameraBackendManager::with_backend(Box::new(
            barcode_scanner::backends::camera::v4l2::V4l2Backend::new()
                .with_warmup(config.warmup()),
        ))),
        #[cfg(not(feature = "v4l2"))]
        other => CameraBackendManager::new(other),
    }
}

/// Resolve the camera device and still format for a source
fn open_camera(
    config: &Config,
    source: &Source,
) -> Result<(CameraBackendManager, CameraDevice, CameraFormat), Box<dyn std::error::Error>> {
    let (manager, device) = match &source.input {
        Some(path) => (
            CameraBackendManager::with_backend(Box::new(FileBackend::with_sources(vec![
                path.clone(),
            ]))),
            FileBackend::device_for(path),
        ),
        None => {
            let manager = backend_manager(config)?;
            let cameras = manager.enumerate_cameras().map_err(|e| {
                if config.backend == CameraBackendType::File {
                    format!("{} (pass --input PATH)", e)
                } else {
                    e.to_string()
                }
            })?;
            let device = match source.camera {
                Some(index) => cameras.get(index).cloned().ok_or_else(|| {
                    format!(
                        "Camera index {} out of range (0-{})",
                        index,
                        cameras.len().saturating_sub(1)
                    )
                })?,
                None => config
                    .last_camera_path
                    .as_ref()
                    .and_then(|path| cameras.iter().find(|c| &c.path == path))
                    .or_else(|| cameras.first())
                    .cloned()
                    .ok_or("No cameras found")?,
            };
            (manager, device)
        }
    };

    let formats = manager.get_formats(&device);
    let format = select_still_format(&formats).ok_or("No formats available for camera")?;
    Ok((manager, device, format))
}

/// List all available cameras
pub fn list_cameras(config: &Config) -> CliResult {
    let manager = backend_manager(config)?;
    let cameras = manager.enumerate_cameras().unwrap_or_default();

    if cameras.is_empty() {
        println!("No cameras found.");
        if config.backend == CameraBackendType::File {
            println!("The file backend uses --input PATH or the configured last_camera_path.");
        }
        return Ok(());
    }

    println!("Available cameras ({}):", config.backend);
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Path: {}", camera.path);

        let mut formats = manager.get_formats(camera);
        formats.sort_by(|a, b| (b.width * b.height).cmp(&(a.width * a.height)));
        formats.dedup_by(|a, b| a.width == b.width && a.height == b.height);
        if !formats.is_empty() {
            let res_strs: Vec<String> = formats
                .iter()
                .take(3)
                .map(|f| format!("{}x{} {}", f.width, f.height, f.pixel_format))
                .collect();
            println!("      Formats: {}", res_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

fn describe(index: usize, barcode: &Barcode) -> String {
    let bounds = barcode
        .bounding_box
        .map(|b| b.to_string())
        .unwrap_or_else(|| "no bounds".to_string());
    format!(
        "  [{}] {:<8} {}  {}",
        index,
        barcode.format.display_name(),
        barcode.raw_value,
        bounds
    )
}

fn print_barcodes(barcodes: &[Barcode]) {
    println!("Found {} barcode(s):", barcodes.len());
    for (index, barcode) in barcodes.iter().enumerate() {
        println!("{}", describe(index, barcode));
    }
}

type ScanOutcome = Option<(Barcode, String, String, Option<SavedScan>)>;

async fn run_scan(
    controller: &mut ScanController,
    device: &CameraDevice,
    format: &CameraFormat,
    args: &ScanArgs,
) -> Result<ScanOutcome, Box<dyn std::error::Error>> {
    controller.start_camera(device, format)?;
    controller.shutter().await?;

    let barcodes = controller.detect().await?.to_vec();
    if barcodes.is_empty() {
        return Ok(None);
    }
    if !args.json {
        print_barcodes(&barcodes);
    }

    let index = args.select.unwrap_or(0);
    if !controller.select(index) {
        return Err(format!(
            "Selection {} out of range (0-{})",
            index,
            barcodes.len() - 1
        )
        .into());
    }
    let (code, code_type) = controller.scan().ok_or("Nothing selected")?;

    let saved = if args.no_save {
        None
    } else {
        Some(controller.save().await?)
    };
    Ok(Some((barcodes[index].clone(), code, code_type, saved)))
}

/// Line announcing the camera; JSON output carries nothing but the result
fn camera_banner(device: &CameraDevice, json: bool) -> Option<String> {
    (!json).then(|| format!("Using camera: {}", device.name))
}

/// Render the outcome of a scan for stdout
fn scan_report(outcome: &ScanOutcome, json: bool) -> Result<String, serde_json::Error> {
    let Some((barcode, code, code_type, saved)) = outcome else {
        return Ok(if json {
            json!({ "barcodes": [] }).to_string()
        } else {
            barcode_scanner::session::NO_BARCODE_MESSAGE.to_string()
        });
    };

    if json {
        let value = json!({
            "type": code_type,
            "content": code,
            "barcode": barcode,
            "saved": saved.as_ref().map(|s| json!({
                "text": s.text_path,
                "image": s.image_path,
                "folder": s.folder,
            })),
        });
        return serde_json::to_string_pretty(&value);
    }

    let mut lines = vec![
        String::new(),
        format!("Type: {}", code_type),
        format!("Content: {}", code),
    ];
    if let Some(saved) = saved {
        lines.push(saved.message());
        lines.push(format!("  {}", saved.text_path.display()));
        lines.push(format!("  {}", saved.image_path.display()));
    }
    Ok(lines.join("\n"))
}

/// Capture, detect, select, scan and save
pub fn scan(config: &Config, args: ScanArgs) -> CliResult {
    let (manager, device, format) = open_camera(config, &args.source)?;
    match camera_banner(&device, args.json) {
        Some(banner) => println!("{}", banner),
        None => info!(camera = %device.name, "Using camera"),
    }

    let mut storage = config.storage();
    if let Some(dir) = &args.output {
        storage = storage.with_base_dir(dir);
    }
    let processor = BarcodeProcessor::with_options(config.processor_options(false));
    let mut controller = ScanController::new(manager, processor.clone(), storage);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(run_scan(&mut controller, &device, &format, &args));
    processor.release();

    println!("{}", scan_report(&outcome?, args.json)?);
    Ok(())
}

/// Detect barcodes in an image file without saving anything
pub fn detect(config: &Config, input: &Path, json: bool) -> CliResult {
    let image = image::open(input)?.to_rgb8();
    let processor = BarcodeProcessor::with_options(config.processor_options(false));
    let barcodes = processor.try_detect(&image)?;
    processor.release();

    if json {
        println!("{}", serde_json::to_string_pretty(&barcodes)?);
    } else if barcodes.is_empty() {
        println!("{}", barcode_scanner::session::NO_BARCODE_MESSAGE);
    } else {
        print_barcodes(&barcodes);
    }
    Ok(())
}

/// What happened to a code handed to the printing thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded {
    Sent,
    /// Channel full; the printer is behind
    Dropped,
    /// Receiver gone; the watch is over
    Closed,
}

fn forward_new_code(sender: &mut mpsc::Sender<Barcode>, barcode: Barcode) -> Forwarded {
    match sender.try_send(barcode) {
        Ok(()) => Forwarded::Sent,
        Err(e) if e.is_full() => {
            let barcode = e.into_inner();
            warn!(
                format = %barcode.format,
                value = %barcode.raw_value,
                "Output channel full, code dropped for this frame"
            );
            Forwarded::Dropped
        }
        Err(_) => Forwarded::Closed,
    }
}

/// Analyse frames continuously, printing codes the first time they are seen
pub fn watch(config: &Config, source: &Source, interval: Option<Duration>) -> CliResult {
    let (manager, device, format) = open_camera(config, source)?;
    manager.start_camera(&device, &format)?;
    println!("Watching {} (press Ctrl+C to stop)", device.name);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let processor = BarcodeProcessor::with_options(config.processor_options(true));
    let loop_processor = processor.clone();
    let loop_manager = manager.clone();
    let (mut sender, mut receiver) = mpsc::channel::<Barcode>(16);
    let mut seen: HashSet<(BarcodeFormat, String)> = HashSet::new();

    let mut frame_loop = CaptureLoopController::start(
        "barcode-watch",
        interval.unwrap_or(timing::ANALYSIS_INTERVAL),
        move || {
            let frame = match loop_manager.take_picture() {
                Ok(frame) => frame,
                Err(BackendError::NotInitialized) => return LoopAction::Stop,
                Err(e) => {
                    warn!(error = %e, "Frame capture failed");
                    return LoopAction::Continue;
                }
            };
            let image = match frame_to_rgb(&frame) {
                Ok(image) => image,
                Err(e) => {
                    warn!(error = %e, "Frame conversion failed");
                    return LoopAction::Continue;
                }
            };
            if loop_processor.is_released() {
                return LoopAction::Stop;
            }
            for barcode in loop_processor.detect_barcodes(&image) {
                let key = (barcode.format, barcode.raw_value.clone());
                if seen.contains(&key) {
                    continue;
                }
                match forward_new_code(&mut sender, barcode) {
                    Forwarded::Sent => {
                        seen.insert(key);
                    }
                    // Not marked as seen so a later frame reports it again
                    Forwarded::Dropped => {}
                    Forwarded::Closed => return LoopAction::Stop,
                }
            }
            LoopAction::Continue
        },
    );

    while !stop_flag.load(Ordering::SeqCst) {
        match receiver.try_next() {
            Ok(Some(barcode)) => {
                println!("{}: {}", barcode.format.display_name(), barcode.raw_value);
            }
            // Loop ended and dropped its sender
            Ok(None) => break,
            Err(_) => std::thread::sleep(timing::POLL_INTERVAL),
        }
    }

    processor.release();
    frame_loop.stop();
    manager.stop_camera()?;
    println!();
    println!("Stopped.");
    Ok(())
}

/// Print the configuration, or reset it to defaults first
pub fn show_config(reset: bool) -> CliResult {
    let config = if reset {
        let config = Config::reset()?;
        println!("Configuration reset to defaults.");
        config
    } else {
        Config::load()?
    };

    match Config::path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no configuration directory"),
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
