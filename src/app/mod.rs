// SPDX-License-Identifier: GPL-3.0-only

//! Capture screen logic
//!
//! [`CaptureController`] drives a camera session the way a host screen does:
//! lifecycle callbacks gate binding, the permission channel triggers binds,
//! and user actions (shutter, exposure, diagnostics) run against whatever
//! setup is currently published.
//!
//! # Architecture
//!
//! - `view_model`: permission and camera setup channels
//! - `exposure`: exposure compensation stepping and timed exposure
//! - `insights`: resolution and RAW capability diagnostics

pub mod exposure;
pub mod insights;
mod view_model;

pub use exposure::{ExposureController, ExposureLevel, compute_index};
pub use insights::{RawSupport, ResolutionInspector, ResolutionReport, raw_support};
pub use view_model::MainViewModel;

use crate::backends::camera::types::{BackendError, ExposureState};
use crate::errors::{AppError, AppResult, CameraError, PermissionError};
use crate::pipelines::photo::{CaptureCoordinator, CaptureTicket};
use crate::session::{
    BindOptions, CameraExecutor, CameraSessionBinder, CameraSetup, LifecycleEvent,
    LifecycleOwner, PendingBind, PreviewTarget,
};
use crate::storage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything a bind needs, shared with the permission observer
#[derive(Clone)]
struct SessionStarter {
    binder: CameraSessionBinder,
    owner: LifecycleOwner,
    preview_target: Arc<PreviewTarget>,
    options: BindOptions,
    view_model: MainViewModel,
    camera_available: Arc<AtomicBool>,
}

impl SessionStarter {
    fn start(&self) -> PendingBind {
        debug!(owner = %self.owner.id(), "Starting camera and preview");
        let view_model = self.view_model.clone();
        self.binder.bind(
            self.preview_target.clone(),
            &self.owner,
            None,
            self.options.clone(),
            move |setup| view_model.set_camera_setup(setup),
        )
    }
}

/// Controller of the capture screen
pub struct CaptureController {
    starter: SessionStarter,
    output_override: Option<PathBuf>,
    coordinator: Mutex<Option<CaptureCoordinator>>,
    executor: Mutex<CameraExecutor>,
    exposure: ExposureController,
    inspector: ResolutionInspector,
    first_resume: AtomicBool,
    observers: Mutex<Vec<JoinHandle<()>>>,
}

impl CaptureController {
    /// Create a controller with its own lifecycle owner and preview target
    pub fn new(
        view_model: MainViewModel,
        binder: CameraSessionBinder,
        options: BindOptions,
        output_override: Option<PathBuf>,
    ) -> AppResult<Self> {
        let executor = CameraExecutor::new()
            .map_err(|e| AppError::Other(format!("cannot start capture executor: {}", e)))?;
        let inspector = ResolutionInspector::new(options.image_format);

        Ok(Self {
            starter: SessionStarter {
                binder,
                owner: LifecycleOwner::new(),
                preview_target: Arc::new(PreviewTarget::new("capture-view-finder")),
                options,
                view_model,
                camera_available: Arc::new(AtomicBool::new(false)),
            },
            output_override,
            coordinator: Mutex::new(None),
            executor: Mutex::new(executor),
            exposure: ExposureController::new(),
            inspector,
            first_resume: AtomicBool::new(true),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn view_model(&self) -> &MainViewModel {
        &self.starter.view_model
    }

    pub fn owner(&self) -> &LifecycleOwner {
        &self.starter.owner
    }

    pub fn preview_target(&self) -> &Arc<PreviewTarget> {
        &self.starter.preview_target
    }

    pub fn is_camera_available(&self) -> bool {
        self.starter.camera_available.load(Ordering::SeqCst)
    }

    /// Directory photos are written to, once created
    pub fn output_directory(&self) -> Option<PathBuf> {
        lock(&self.coordinator)
            .as_ref()
            .map(|coordinator| coordinator.output_directory().to_path_buf())
    }

    pub fn executor(&self) -> CameraExecutor {
        lock(&self.executor).clone()
    }

    pub fn on_create(&self) {
        self.owner().handle_event(LifecycleEvent::OnCreate);
        self.check_camera_permissions();

        let output_directory = storage::output_directory(self.output_override.as_deref());
        info!(path = %output_directory.display(), "Photo directory ready");
        *lock(&self.coordinator) = Some(CaptureCoordinator::new(output_directory));
    }

    /// Bind if the camera is available and start observing state
    ///
    /// Later permission grants trigger a bind; every published setup has its
    /// exposure state logged. Must be called inside a tokio runtime.
    pub fn on_view_created(&self) {
        if self.is_camera_available() {
            self.starter.start();
        }

        let starter = self.starter.clone();
        let mut permission = self.view_model().subscribe_permission();
        let permission_observer = tokio::spawn(async move {
            while permission.changed().await.is_ok() {
                let granted = *permission.borrow_and_update();
                debug!(granted, "Camera permission");
                starter.camera_available.store(granted, Ordering::SeqCst);
                if granted {
                    starter.start();
                }
            }
        });

        let exposure = self.exposure;
        let mut setup = self.view_model().subscribe_camera_setup();
        let setup_observer = tokio::spawn(async move {
            while setup.changed().await.is_ok() {
                let current = setup.borrow_and_update().clone();
                if let Some(camera) = current.camera.as_ref() {
                    for line in exposure.exposure_info(camera).as_lines() {
                        debug!("{}", line);
                    }
                }
            }
        });

        lock(&self.observers).extend([permission_observer, setup_observer]);
    }

    pub fn on_start(&self) {
        self.owner().handle_event(LifecycleEvent::OnStart);
    }

    /// After the first resume, restart a shut down executor while the
    /// permission is still granted
    pub fn on_resume(&self) -> AppResult<()> {
        self.owner().handle_event(LifecycleEvent::OnResume);
        if self.first_resume.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut executor = lock(&self.executor);
        if self.view_model().permission_gate().all_permissions_granted() && executor.is_shutdown() {
            *executor = CameraExecutor::new()
                .map_err(|e| AppError::Other(format!("cannot restart capture executor: {}", e)))?;
            drop(executor);
            info!("Capture executor restarted");
            self.check_camera_permissions();
        }
        Ok(())
    }

    pub fn on_pause(&self) {
        self.owner().handle_event(LifecycleEvent::OnPause);
    }

    pub fn on_stop(&self) {
        self.owner().handle_event(LifecycleEvent::OnStop);
        lock(&self.executor).shutdown();
    }

    /// Drain queued captures, then destroy the owner so the camera is released
    ///
    /// Blocks until the capture thread has finished its queue.
    pub fn on_destroy(&self) {
        let executor = self.executor();
        executor.await_termination();
        self.owner().handle_event(LifecycleEvent::OnDestroy);
        self.stop_observers();
    }

    /// Forward a permission request result to the permission gate
    pub fn on_request_permissions_result(&self, request_code: i32) -> Result<(), PermissionError> {
        self.view_model()
            .permission_gate()
            .on_request_permissions_result(request_code)
    }

    /// Wait until a bound setup is published
    pub async fn wait_for_setup(&self, timeout: Duration) -> Result<CameraSetup, CameraError> {
        let mut setup = self.view_model().subscribe_camera_setup();
        let bound = async {
            loop {
                {
                    let current = setup.borrow_and_update();
                    if current.is_bound() {
                        return Some(current.clone());
                    }
                }
                if setup.changed().await.is_err() {
                    return None;
                }
            }
        };

        match tokio::time::timeout(timeout, bound).await {
            Ok(Some(setup)) => Ok(setup),
            Ok(None) => Err(CameraError::BindingFailed(
                "camera setup channel closed".to_string(),
            )),
            Err(_) => Err(CameraError::BindTimeout),
        }
    }

    /// Shutter press
    ///
    /// `None` when nothing can be captured (no capture use case, or the
    /// screen was never created).
    pub fn take_photo(&self) -> Option<CaptureTicket> {
        let coordinator = lock(&self.coordinator).clone();
        let Some(coordinator) = coordinator else {
            warn!("Photo requested before the capture screen was created");
            return None;
        };
        let setup = self.view_model().camera_setup();
        let executor = self.executor();
        coordinator.take_photo(&setup, &executor)
    }

    /// Apply an exposure level to the bound camera
    pub fn apply_exposure(&self, level: ExposureLevel) -> Option<i32> {
        let setup = self.view_model().camera_setup();
        let Some(camera) = setup.camera.as_ref() else {
            debug!(?level, "No bound camera for exposure request");
            return None;
        };
        self.exposure.apply(camera, level)
    }

    pub fn exposure_info(&self) -> Option<ExposureState> {
        self.view_model()
            .camera_setup()
            .camera
            .as_ref()
            .map(|camera| self.exposure.exposure_info(camera))
    }

    pub fn set_exact_exposure_time(&self, exposure: Duration) -> AppResult<()> {
        let setup = self.view_model().camera_setup();
        let camera = setup.camera.as_ref().ok_or(BackendError::CameraClosed)?;
        self.exposure.set_exact_exposure_time(camera, exposure)?;
        Ok(())
    }

    pub fn inspect_resolutions(&self) -> Option<ResolutionReport> {
        let setup = self.view_model().camera_setup();
        let camera = setup.camera.as_ref()?;
        let platform_level = setup
            .camera_manager
            .as_ref()
            .unwrap_or(self.starter.binder.camera_manager())
            .platform_level();
        Some(self.inspector.inspect(camera, platform_level))
    }

    pub fn raw_support(&self) -> Vec<RawSupport> {
        let setup = self.view_model().camera_setup();
        let manager = setup
            .camera_manager
            .as_ref()
            .unwrap_or(self.starter.binder.camera_manager());
        raw_support(manager)
    }

    fn check_camera_permissions(&self) {
        let gate = self.view_model().permission_gate();
        if gate.all_permissions_granted() {
            self.starter.camera_available.store(true, Ordering::SeqCst);
        } else {
            gate.request_permissions();
        }
    }

    fn stop_observers(&self) {
        for observer in lock(&self.observers).drain(..) {
            observer.abort();
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop_observers();
    }
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("owner", &self.starter.owner)
            .field("camera_available", &self.is_camera_available())
            .field("output_directory", &self.output_directory())
            .finish()
    }
}
