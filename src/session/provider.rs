// SPDX-License-Identifier: GPL-3.0-only

//! Process camera provider
//!
//! The provider owns the single bound use-case set. Binding opens the selected
//! camera and attaches every use case to it; unbinding detaches them and
//! releases the device. When the owning lifecycle is destroyed the provider
//! unbinds on its own.

use super::camera::Camera;
use super::lifecycle::{LifecycleOwner, LifecycleState};
use super::use_cases::UseCase;
use crate::backends::camera::{
    BackendError, CameraCharacteristics, CameraManager, CameraSelector, Size,
};
use crate::errors::CameraError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Largest resolution offered to preview surfaces
const MAX_PREVIEW_SIZE: Size = Size::new(1920, 1080);

/// Fallback preview resolution for cameras that list no sizes
const DEFAULT_PREVIEW_SIZE: Size = Size::new(640, 480);

struct BoundSession {
    owner_id: Uuid,
    camera: Camera,
    use_cases: Vec<UseCase>,
    watcher: Option<JoinHandle<()>>,
}

struct ProviderInner {
    manager: CameraManager,
    bound: Mutex<Option<BoundSession>>,
}

impl ProviderInner {
    fn lock(&self) -> MutexGuard<'_, Option<BoundSession>> {
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        if let Some(session) = self.lock().take() {
            release(session);
        }
    }
}

/// Binds use cases to cameras for the whole process
///
/// Cheap to clone; clones share the bound session.
#[derive(Clone)]
pub struct ProcessCameraProvider {
    inner: Arc<ProviderInner>,
}

impl ProcessCameraProvider {
    /// Initialize the backend and return a provider for it
    ///
    /// Backend probing may touch devices, so it runs on a blocking task.
    pub async fn get_instance(manager: CameraManager) -> Result<Self, CameraError> {
        let probe = manager.clone();
        let camera_ids = tokio::task::spawn_blocking(move || {
            if !probe.is_available() {
                return Err(BackendError::NotAvailable(probe.backend_type().to_string()));
            }
            Ok(probe.camera_id_list())
        })
        .await
        .map_err(|e| CameraError::BindingFailed(format!("provider initialization failed: {}", e)))??;

        info!(
            backend = %manager.backend_type(),
            cameras = camera_ids.len(),
            "Camera provider ready"
        );
        Ok(Self::new(manager))
    }

    /// Provider over an already initialized backend
    pub fn new(manager: CameraManager) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                manager,
                bound: Mutex::new(None),
            }),
        }
    }

    pub fn camera_manager(&self) -> &CameraManager {
        &self.inner.manager
    }

    /// Bind use cases to a camera for the lifetime of `owner`
    ///
    /// Fails with [`BackendError::Busy`] while another set is bound; callers
    /// unbind first.
    pub fn bind_to_lifecycle(
        &self,
        owner: &LifecycleOwner,
        selector: CameraSelector,
        use_cases: &[UseCase],
    ) -> Result<Camera, CameraError> {
        if owner.current_state() == LifecycleState::Destroyed {
            return Err(CameraError::BindingFailed(
                "lifecycle owner is destroyed".to_string(),
            ));
        }
        if use_cases.is_empty() {
            return Err(CameraError::BindingFailed("no use cases to bind".to_string()));
        }

        let mut bound = self.inner.lock();
        if let Some(existing) = bound.as_ref() {
            return Err(CameraError::Backend(BackendError::Busy(format!(
                "camera {} is already bound",
                existing.camera.camera_id()
            ))));
        }

        let manager = &self.inner.manager;
        let devices = manager.cameras()?;
        let device = selector
            .select(&devices)
            .cloned()
            .ok_or_else(|| CameraError::BindingFailed(format!("no camera matches {:?}", selector)))?;
        let characteristics = manager.characteristics(&device)?;
        let control = manager.open(&device)?;
        let camera = Camera::new(device, characteristics, control, owner.subscribe());

        for use_case in use_cases {
            match use_case {
                UseCase::Preview(preview) => preview.attach(
                    camera.camera_id(),
                    preview_resolution(camera.characteristics()),
                ),
                UseCase::ImageCapture(capture) => capture.attach(camera.clone()),
            }
        }

        info!(
            owner = %owner.id(),
            camera_id = %camera.camera_id(),
            use_cases = ?use_cases.iter().map(UseCase::name).collect::<Vec<_>>(),
            "Use cases bound"
        );

        *bound = Some(BoundSession {
            owner_id: owner.id(),
            camera: camera.clone(),
            use_cases: use_cases.to_vec(),
            watcher: self.watch_owner(owner),
        });
        Ok(camera)
    }

    /// Detach every bound use case and release the camera
    pub fn unbind_all(&self) {
        let session = self.inner.lock().take();
        match session {
            Some(session) => release(session),
            None => debug!("Nothing bound"),
        }
    }

    pub fn has_bound_session(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn bound_use_cases(&self) -> Vec<UseCase> {
        self.inner
            .lock()
            .as_ref()
            .map(|session| session.use_cases.clone())
            .unwrap_or_default()
    }

    pub fn is_bound(&self, use_case: &UseCase) -> bool {
        self.inner.lock().as_ref().is_some_and(|session| {
            session
                .use_cases
                .iter()
                .any(|bound| bound.ptr_eq(use_case))
        })
    }

    fn unbind_owner(&self, owner_id: Uuid) {
        let session = {
            let mut bound = self.inner.lock();
            if bound.as_ref().is_some_and(|s| s.owner_id == owner_id) {
                bound.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            info!(owner = %owner_id, "Lifecycle destroyed, unbinding");
            release(session);
        }
    }

    /// Unbind once the owner is destroyed
    ///
    /// Needs a tokio runtime; without one the session stays bound until
    /// `unbind_all`, and captures already fail on a destroyed owner.
    fn watch_owner(&self, owner: &LifecycleOwner) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let mut lifecycle = owner.subscribe();
        let owner_id = owner.id();
        let provider: Weak<ProviderInner> = Arc::downgrade(&self.inner);

        Some(runtime.spawn(async move {
            loop {
                if *lifecycle.borrow_and_update() == LifecycleState::Destroyed {
                    break;
                }
                if lifecycle.changed().await.is_err() {
                    return;
                }
            }
            if let Some(inner) = provider.upgrade() {
                ProcessCameraProvider { inner }.unbind_owner(owner_id);
            }
        }))
    }
}

fn release(session: BoundSession) {
    for use_case in &session.use_cases {
        match use_case {
            UseCase::Preview(preview) => preview.detach(),
            UseCase::ImageCapture(capture) => capture.detach(),
        }
    }
    session.camera.close();
    if let Some(watcher) = session.watcher {
        watcher.abort();
    }
    info!(camera_id = %session.camera.camera_id(), "Use cases unbound");
}

/// Resolution offered to preview surfaces
fn preview_resolution(characteristics: &CameraCharacteristics) -> Size {
    let sizes = characteristics.stream_configuration_map.preview_output_sizes();
    sizes
        .iter()
        .copied()
        .find(|size| size.width <= MAX_PREVIEW_SIZE.width && size.height <= MAX_PREVIEW_SIZE.height)
        .or_else(|| sizes.last().copied())
        .unwrap_or(DEFAULT_PREVIEW_SIZE)
}

impl std::fmt::Debug for ProcessCameraProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessCameraProvider")
            .field("manager", &self.inner.manager)
            .field("bound", &self.has_bound_session())
            .finish()
    }
}
