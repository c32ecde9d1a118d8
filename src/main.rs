// SPDX-License-Identifier: GPL-3.0-only

use camera_session::app::ExposureLevel;
use camera_session::backends::camera::{CameraBackendType, ImageFormat};
use camera_session::{CaptureMode, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-session")]
#[command(about = "Lifecycle-gated camera sessions from the command line")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Camera backend (default: from config)
    #[arg(short, long, global = true, value_enum)]
    backend: Option<CameraBackendType>,

    /// Camera index to use (from 'camera-session list')
    #[arg(short, long, global = true)]
    camera: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Show supported output sizes and RAW capability
    Inspect {
        /// Image format to list output sizes for
        #[arg(short, long, value_enum)]
        format: Option<ImageFormat>,
    },

    /// Show or change exposure compensation
    Exposure {
        /// Exposure level to apply
        #[arg(short, long, value_enum)]
        set: Option<ExposureLevel>,

        /// Fixed exposure time in microseconds (manual exposure)
        #[arg(short, long)]
        time_us: Option<u64>,
    },

    /// Take a photo
    Photo {
        /// Exposure level to apply before capturing
        #[arg(short, long, value_enum)]
        exposure: Option<ExposureLevel>,

        /// Output directory (default: ~/Pictures/camera-session)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Capture mode
        #[arg(short, long, value_enum)]
        mode: Option<CaptureMode>,
    },

    /// Bind a session and keep it alive until Ctrl+C
    Session,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_session=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Commands::Inspect {
        format: Some(format),
    } = cli.command
    {
        config.image_format = format;
    }

    // Single-threaded runtime plays the host's main thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let context = cli::CliContext::new(config, cli.camera);
    match cli.command {
        Commands::List => cli::list_cameras(&context),
        Commands::Inspect { .. } => runtime.block_on(cli::inspect(context)),
        Commands::Exposure { set, time_us } => runtime.block_on(cli::exposure(context, set, time_us)),
        Commands::Photo {
            exposure,
            output,
            mode,
        } => runtime.block_on(cli::take_photo(context, exposure, output, mode)),
        Commands::Session => runtime.block_on(cli::run_session(context)),
    }
}
