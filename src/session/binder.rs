// SPDX-License-Identifier: GPL-3.0-only

//! Camera session binding
//!
//! Rebinds preview and capture use cases to a lifecycle owner:
//!
//! ```text
//! provider ─▶ Preview ─▶ orientation listener ─▶ unbind_all + bind ─▶ callback
//!                                                                      │
//!                                           auto focus, resolution log ◀┘
//! ```
//!
//! Failures are logged and the callback is skipped, so callers keep their
//! previous setup. There is no retry.

use super::lifecycle::LifecycleOwner;
use super::orientation::{OrientationEventListener, OrientationSource};
use super::provider::ProcessCameraProvider;
use super::setup::CameraSetup;
use super::use_cases::{ImageCapture, Preview, SurfaceProvider, UseCase};
use crate::app::insights::ResolutionInspector;
use crate::backends::camera::types::{FocusMeteringAction, ImageFormat};
use crate::backends::camera::{CameraManager, CameraSelector};
use crate::constants::{AUTO_FOCUS_INTERVAL, CaptureMode};
use crate::errors::CameraError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Options for a bind
#[derive(Debug, Clone)]
pub struct BindOptions {
    /// Mode of the capture use case created when none is passed in
    pub capture_mode: CaptureMode,
    pub selector: CameraSelector,
    /// Start a centered focus/metering action after binding
    pub auto_focus: bool,
    pub auto_focus_interval: Duration,
    /// Format of the post-bind resolution report
    pub image_format: ImageFormat,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            capture_mode: CaptureMode::default(),
            selector: CameraSelector::DEFAULT_BACK_CAMERA,
            auto_focus: true,
            auto_focus_interval: AUTO_FOCUS_INTERVAL,
            image_format: ImageFormat::Yuv,
        }
    }
}

/// A bind in flight
///
/// `setup` is available immediately and holds only the capture use case.
#[derive(Debug)]
pub struct PendingBind {
    pub setup: CameraSetup,
    task: JoinHandle<Result<CameraSetup, CameraError>>,
}

impl PendingBind {
    /// Wait for the bind to resolve
    pub async fn wait(self) -> Result<CameraSetup, CameraError> {
        self.task
            .await
            .map_err(|e| CameraError::BindingFailed(format!("bind task failed: {}", e)))?
    }
}

/// Binds preview and capture use cases to lifecycle owners
///
/// Clones share the provider, the orientation listener and the bind lock.
#[derive(Clone)]
pub struct CameraSessionBinder {
    manager: CameraManager,
    provider: Arc<OnceCell<ProcessCameraProvider>>,
    orientation: Arc<dyn OrientationSource>,
    listener: Arc<Mutex<Option<OrientationEventListener>>>,
    bind_lock: Arc<tokio::sync::Mutex<()>>,
}

impl CameraSessionBinder {
    pub fn new(manager: CameraManager, orientation: Arc<dyn OrientationSource>) -> Self {
        Self {
            manager,
            provider: Arc::new(OnceCell::new()),
            orientation,
            listener: Arc::new(Mutex::new(None)),
            bind_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn camera_manager(&self) -> &CameraManager {
        &self.manager
    }

    /// Process camera provider, initialized on first use
    pub async fn provider(&self) -> Result<ProcessCameraProvider, CameraError> {
        self.provider
            .get_or_try_init(|| ProcessCameraProvider::get_instance(self.manager.clone()))
            .await
            .cloned()
    }

    /// Provider if one has been initialized already
    pub fn existing_provider(&self) -> Option<ProcessCameraProvider> {
        self.provider.get().cloned()
    }

    /// Bind preview and capture to `owner`
    ///
    /// Must be called inside a tokio runtime. `on_bound` runs once the camera
    /// is bound and never runs when binding fails.
    pub fn bind<F>(
        &self,
        preview_target: Arc<dyn SurfaceProvider>,
        owner: &LifecycleOwner,
        image_capture: Option<ImageCapture>,
        options: BindOptions,
        on_bound: F,
    ) -> PendingBind
    where
        F: FnOnce(CameraSetup) + Send + 'static,
    {
        let image_capture = image_capture.unwrap_or_else(|| {
            ImageCapture::builder()
                .capture_mode(options.capture_mode)
                .build()
        });
        let setup = CameraSetup::with_image_capture(image_capture.clone());

        let binder = self.clone();
        let owner = owner.clone();
        let task = tokio::spawn(async move {
            match binder
                .bind_use_cases(preview_target, &owner, image_capture, &options)
                .await
            {
                Ok(setup) => {
                    on_bound(setup.clone());
                    binder.after_bind(&setup, &options);
                    Ok(setup)
                }
                Err(err) => {
                    error!(owner = %owner.id(), error = %err, "Use case binding failed");
                    Err(err)
                }
            }
        });

        PendingBind { setup, task }
    }

    async fn bind_use_cases(
        &self,
        preview_target: Arc<dyn SurfaceProvider>,
        owner: &LifecycleOwner,
        image_capture: ImageCapture,
        options: &BindOptions,
    ) -> Result<CameraSetup, CameraError> {
        let provider = self.provider().await?;

        let preview = Preview::new();
        preview.set_surface_provider(preview_target);

        self.listen_orientation(image_capture.clone());

        let _guard = self.bind_lock.lock().await;
        let use_cases: Vec<UseCase> = vec![preview.into(), image_capture.clone().into()];
        let selector = options.selector;
        let bind_provider = provider.clone();
        let bind_owner = owner.clone();
        let camera = tokio::task::spawn_blocking(move || {
            bind_provider.unbind_all();
            bind_provider.bind_to_lifecycle(&bind_owner, selector, &use_cases)
        })
        .await
        .map_err(|e| CameraError::BindingFailed(format!("bind task failed: {}", e)))??;

        Ok(CameraSetup {
            image_capture: Some(image_capture),
            camera: Some(camera),
            camera_manager: Some(provider.camera_manager().clone()),
        })
    }

    fn listen_orientation(&self, image_capture: ImageCapture) {
        let listener = OrientationEventListener::enable(self.orientation.as_ref(), image_capture);
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(listener);
        if let Some(previous) = previous {
            previous.disable();
        }
    }

    fn after_bind(&self, setup: &CameraSetup, options: &BindOptions) {
        let Some(camera) = setup.camera.as_ref() else {
            return;
        };

        if options.auto_focus {
            let action = FocusMeteringAction::centered().with_auto_cancel(options.auto_focus_interval);
            if let Err(err) = camera.start_focus_and_metering(action) {
                debug!(camera_id = %camera.camera_id(), %err, "Auto focus unavailable");
            }
        }

        let report = ResolutionInspector::new(options.image_format)
            .inspect(camera, self.manager.platform_level());
        info!(
            camera_id = %report.camera_id,
            output_sizes = report.output_sizes.len(),
            preview_sizes = report.preview_sizes.len(),
            "Camera bound"
        );
    }
}

impl std::fmt::Debug for CameraSessionBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSessionBinder")
            .field("manager", &self.manager)
            .field("provider_ready", &self.provider.initialized())
            .finish()
    }
}
