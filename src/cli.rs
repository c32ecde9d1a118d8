// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Inspecting output sizes and RAW capability
//! - Stepping exposure compensation
//! - Taking photos
//! - Keeping a bound session alive

use camera_session::app::{CaptureController, ExposureLevel, MainViewModel};
use camera_session::backends::camera::{CameraBackendType, CameraManager, get_backend_for_type};
use camera_session::constants::{BIND_TIMEOUT, CaptureMode, REQUEST_CODE_PERMISSIONS};
use camera_session::session::{
    CameraSessionBinder, CameraSetup, DevicePermissionChecker, ManualOrientationSource,
    PermissionChecker, PermissionGate, StaticPermissionChecker,
};
use camera_session::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Settings shared by every command
pub struct CliContext {
    config: Config,
    camera_index: Option<usize>,
}

impl CliContext {
    pub fn new(config: Config, camera_index: Option<usize>) -> Self {
        Self {
            config,
            camera_index,
        }
    }

    fn camera_manager(&self) -> CameraManager {
        CameraManager::new(get_backend_for_type(self.config.backend))
    }

    fn permission_checker(&self) -> Arc<dyn PermissionChecker> {
        match self.config.backend {
            CameraBackendType::V4l2 => Arc::new(DevicePermissionChecker::new()),
            CameraBackendType::Synthetic => Arc::new(StaticPermissionChecker::granted()),
        }
    }
}

/// A bound capture screen driven through its lifecycle
struct Session {
    controller: CaptureController,
    binder: CameraSessionBinder,
    setup: CameraSetup,
}

impl Session {
    async fn open(context: &CliContext) -> Result<Self, Box<dyn std::error::Error>> {
        let manager = context.camera_manager();
        let binder = CameraSessionBinder::new(manager, Arc::new(ManualOrientationSource::default()));
        let view_model = MainViewModel::new(PermissionGate::new(context.permission_checker()));
        let controller = CaptureController::new(
            view_model,
            binder.clone(),
            context.config.bind_options(context.camera_index),
            context.config.output_directory.clone(),
        )?;

        controller.on_create();
        if !controller.is_camera_available() {
            // Nothing can prompt on a terminal; the answer is the current access
            controller.on_request_permissions_result(REQUEST_CODE_PERMISSIONS)?;
        }
        controller.on_view_created();
        controller.on_start();
        controller.on_resume()?;

        let setup = controller.wait_for_setup(BIND_TIMEOUT).await?;
        Ok(Self {
            controller,
            binder,
            setup,
        })
    }

    fn close(self) {
        self.controller.on_pause();
        self.controller.on_stop();
        self.controller.on_destroy();
        if let Some(provider) = self.binder.existing_provider() {
            provider.unbind_all();
        }
    }
}

/// List all available cameras
pub fn list_cameras(context: &CliContext) -> CliResult {
    let manager = context.camera_manager();
    if !manager.is_available() {
        println!("Backend {} is not available.", manager.backend_type());
        return Ok(());
    }

    let cameras = manager.cameras().unwrap_or_default();
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.lens_facing);

        let Ok(characteristics) = manager.characteristics(camera) else {
            println!();
            continue;
        };

        // Show top 3 resolutions
        let sizes = characteristics.stream_configuration_map.preview_output_sizes();
        let size_strs: Vec<String> = sizes.iter().take(3).map(ToString::to_string).collect();
        if !size_strs.is_empty() {
            println!("      Sizes: {}", size_strs.join(", "));
        }

        match characteristics.exposure_compensation {
            Some(info) if characteristics.supports_exposure_compensation() => println!(
                "      Exposure compensation: {} steps of {} EV",
                info.range, info.step
            ),
            _ => println!("      Exposure compensation: not supported"),
        }
        println!();
    }

    Ok(())
}

/// Print output sizes of the bound camera and RAW support of every camera
pub async fn inspect(context: CliContext) -> CliResult {
    let session = Session::open(&context).await?;

    if let Some(report) = session.controller.inspect_resolutions() {
        for line in report.as_lines() {
            println!("{}", line);
        }
    }
    println!();
    for support in session.controller.raw_support() {
        println!("{}", support);
    }

    session.close();
    Ok(())
}

/// Print the exposure state, optionally after changing it
pub async fn exposure(
    context: CliContext,
    level: Option<ExposureLevel>,
    time_us: Option<u64>,
) -> CliResult {
    let session = Session::open(&context).await?;

    if let Some(level) = level {
        match session.controller.apply_exposure(level) {
            Some(index) => println!("{}: index {}", level.display_name(), index),
            None => println!("Exposure compensation is not supported by this camera."),
        }
    }
    if let Some(time_us) = time_us {
        session
            .controller
            .set_exact_exposure_time(Duration::from_micros(time_us))?;
        println!("Exposure time set to {} µs", time_us);
    }

    if let Some(state) = session.controller.exposure_info() {
        for line in state.as_lines() {
            println!("{}", line);
        }
        if state.supported {
            println!("Exposure compensation: {:+.2} EV", state.ev());
        }
    }

    session.close();
    Ok(())
}

/// Take a photo using the configured camera
pub async fn take_photo(
    mut context: CliContext,
    exposure: Option<ExposureLevel>,
    output: Option<PathBuf>,
    mode: Option<CaptureMode>,
) -> CliResult {
    if let Some(mode) = mode {
        context.config.capture_mode = mode;
    }
    if output.is_some() {
        context.config.output_directory = output;
    }

    let session = Session::open(&context).await?;
    if let Some(camera) = session.setup.camera.as_ref() {
        println!("Using camera: {}", camera.device().name);
    }
    if let Some(level) = exposure {
        session.controller.apply_exposure(level);
    }

    println!("Capturing...");
    let result: Result<PathBuf, Box<dyn std::error::Error>> = match session.controller.take_photo() {
        Some(ticket) => ticket.wait().await.map_err(Into::into),
        None => Err("No capture use case bound".into()),
    };
    session.close();

    let path = result?;
    println!("Photo saved: {}", path.display());
    Ok(())
}

/// Keep a session bound until Ctrl+C
pub async fn run_session(context: CliContext) -> CliResult {
    let session = Session::open(&context).await?;
    if let Some(camera) = session.setup.camera.as_ref() {
        println!(
            "Session bound to {} ({})",
            camera.device().name,
            camera.camera_id()
        );
    }
    for surface in session.controller.preview_target().live_surfaces() {
        println!("Preview surface {}: {}", surface.surface_id, surface.resolution);
    }

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Press Ctrl+C to stop");
    while !stop_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    println!();
    println!("Stopping...");

    session.close();
    Ok(())
}
