// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::backends::camera::CameraBackendType;
use barcode_scanner::barcode::BarcodeFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Capture a still, detect barcodes and save the scan result")]
#[command(version = barcode_scanner::constants::app_info::version())]
struct Cli {
    /// Camera backend (file or v4l2), overriding the configuration
    #[arg(long, global = true, value_parser = parse_backend)]
    backend: Option<CameraBackendType>,

    /// Barcode formats to report, e.g. qr,ean13,code128
    #[arg(long, global = true, value_delimiter = ',', value_parser = parse_format)]
    formats: Vec<BarcodeFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Image file or directory to use as the camera
    #[arg(short, long, conflicts_with = "camera")]
    input: Option<PathBuf>,

    /// Camera index to use (from 'barcode-scanner list')
    #[arg(short, long)]
    camera: Option<usize>,
}

impl From<SourceArgs> for cli::Source {
    fn from(args: SourceArgs) -> Self {
        Self {
            input: args.input,
            camera: args.camera,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Capture a still, detect barcodes, scan one and save it
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// Index of the detected barcode to scan (default: first)
        #[arg(short, long)]
        select: Option<usize>,

        /// Print the result without saving it
        #[arg(long)]
        no_save: bool,

        /// Base directory for results (default: Downloads)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect barcodes in an image file
    Detect {
        /// Image file to analyse
        #[arg(short, long)]
        input: PathBuf,

        /// Print detections as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyse camera frames until Ctrl+C, printing new codes
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Milliseconds between analysed frames
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Show the configuration
    Config {
        /// Reset the configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

fn parse_backend(value: &str) -> Result<CameraBackendType, String> {
    match value.to_ascii_lowercase().as_str() {
        "file" | "files" => Ok(CameraBackendType::File),
        "v4l2" | "v4l" => Ok(CameraBackendType::V4l2),
        other => Err(format!("unknown backend '{}' (expected file or v4l2)", other)),
    }
}

fn parse_format(value: &str) -> Result<BarcodeFormat, String> {
    BarcodeFormat::parse(value).ok_or_else(|| {
        let known: Vec<String> = BarcodeFormat::ALL
            .iter()
            .map(|f| f.display_name().to_ascii_lowercase())
            .collect();
        format!("unknown format '{}' (expected one of {})", value, known.join(", "))
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=barcode_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { reset } = cli.command {
        return cli::show_config(reset);
    }
    let config = cli::load_config(cli.backend, &cli.formats)?;

    match cli.command {
        Commands::List => cli::list_cameras(&config),
        Commands::Scan {
            source,
            select,
            no_save,
            output,
            json,
        } => cli::scan(
            &config,
            cli::ScanArgs {
                source: source.into(),
                select,
                no_save,
                output,
                json,
            },
        ),
        Commands::Detect { input, json } => cli::detect(&config, &input, json),
        Commands::Watch {
            source,
            interval_ms,
        } => cli::watch(
            &config,
            &source.into(),
            interval_ms.map(Duration::from_millis),
        ),
        Commands::Config { reset } => cli::show_config(reset),
    }
}
