// SPDX-License-Identifier: GPL-3.0-only

//! Bound camera handle
//!
//! A [`Camera`] exists while use cases are bound to it. It serializes access
//! to the backend control and refuses work once unbound.

use super::lifecycle::LifecycleState;
use crate::backends::camera::{
    BackendError, BackendResult, CameraCharacteristics, CameraControl, CameraDevice, CameraFrame,
    ExposureState, FocusMeteringAction, Size,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct CameraInner {
    device: CameraDevice,
    characteristics: CameraCharacteristics,
    control: Mutex<Box<dyn CameraControl>>,
    lifecycle: watch::Receiver<LifecycleState>,
    open: AtomicBool,
}

/// Handle to the camera a use-case set is bound to
///
/// Cheap to clone; clones refer to the same bound camera.
#[derive(Clone)]
pub struct Camera {
    inner: Arc<CameraInner>,
}

impl Camera {
    pub(crate) fn new(
        device: CameraDevice,
        characteristics: CameraCharacteristics,
        control: Box<dyn CameraControl>,
        lifecycle: watch::Receiver<LifecycleState>,
    ) -> Self {
        Self {
            inner: Arc::new(CameraInner {
                device,
                characteristics,
                control: Mutex::new(control),
                lifecycle,
                open: AtomicBool::new(true),
            }),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.inner.device.id
    }

    pub fn device(&self) -> &CameraDevice {
        &self.inner.device
    }

    pub fn characteristics(&self) -> &CameraCharacteristics {
        &self.inner.characteristics
    }

    /// Still bound to its use cases
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Current state of the owner this camera is bound to
    pub fn lifecycle_state(&self) -> LifecycleState {
        *self.inner.lifecycle.borrow()
    }

    /// Whether the camera can capture right now
    pub fn is_active(&self) -> bool {
        self.is_open() && self.lifecycle_state().is_at_least(LifecycleState::Started)
    }

    /// Same camera (not just the same device)
    pub fn ptr_eq(&self, other: &Camera) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn control(&self) -> BackendResult<MutexGuard<'_, Box<dyn CameraControl>>> {
        if !self.is_open() {
            return Err(BackendError::CameraClosed);
        }
        Ok(self
            .inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Read the exposure compensation state from the camera
    ///
    /// Every call queries the device; nothing is cached.
    pub fn exposure_state(&self) -> BackendResult<ExposureState> {
        let Some(info) = self.inner.characteristics.exposure_compensation else {
            return Ok(ExposureState::unsupported());
        };
        if !self.inner.characteristics.supports_exposure_compensation() {
            return Ok(ExposureState {
                supported: false,
                range: info.range,
                step: info.step,
                index: 0,
            });
        }

        let index = self.control()?.exposure_compensation_index()?;
        Ok(ExposureState {
            index,
            range: info.range,
            step: info.step,
            supported: true,
        })
    }

    /// Apply an exposure compensation index
    pub fn set_exposure_compensation_index(&self, index: i32) -> BackendResult<()> {
        let Some(info) = self.inner.characteristics.exposure_compensation else {
            return Err(BackendError::ControlNotSupported(
                "exposure compensation".to_string(),
            ));
        };
        if !info.range.contains(index) {
            return Err(BackendError::InvalidArgument(format!(
                "exposure index {} outside {}",
                index, info.range
            )));
        }

        debug!(camera_id = %self.camera_id(), index, "Applying exposure compensation");
        self.control()?.set_exposure_compensation_index(index)
    }

    /// Switch to manual exposure with a fixed exposure time
    pub fn set_exposure_time(&self, exposure: Duration) -> BackendResult<()> {
        if self.inner.characteristics.exposure_time_range.is_none() {
            return Err(BackendError::ControlNotSupported("exposure time".to_string()));
        }
        debug!(camera_id = %self.camera_id(), ?exposure, "Applying exposure time");
        self.control()?.set_exposure_time(exposure)
    }

    /// Start focus and metering
    ///
    /// With an auto-cancel delay, a task on the current tokio runtime cancels
    /// the action later. Without a runtime the action stays until cancelled.
    pub fn start_focus_and_metering(&self, action: FocusMeteringAction) -> BackendResult<()> {
        if !self.inner.characteristics.has_auto_focus {
            return Err(BackendError::ControlNotSupported("auto focus".to_string()));
        }
        self.control()?.start_focus_and_metering(&action)?;
        info!(camera_id = %self.camera_id(), x = action.point.x, y = action.point.y, "Focus and metering started");

        if let Some(delay) = action.auto_cancel {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let camera = self.clone();
                    handle.spawn(async move {
                        tokio::time::sleep(delay).await;
                        if camera.is_open()
                            && let Err(err) = camera.cancel_focus_and_metering()
                        {
                            debug!(%err, "Auto-cancel of focus failed");
                        }
                    });
                }
                Err(_) => debug!("No runtime for focus auto-cancel"),
            }
        }
        Ok(())
    }

    pub fn cancel_focus_and_metering(&self) -> BackendResult<()> {
        debug!(camera_id = %self.camera_id(), "Cancelling focus and metering");
        self.control()?.cancel_focus_and_metering()
    }

    /// Grab a still frame; blocks until the backend delivers it
    pub fn capture_still(&self, size: Option<Size>) -> BackendResult<CameraFrame> {
        if !self.is_active() {
            return Err(BackendError::CameraClosed);
        }
        self.control()?.capture_still(size)
    }

    /// Release the device; the handle stays valid but refuses work
    pub(crate) fn close(&self) {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            self.inner
                .control
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .close();
            info!(camera_id = %self.camera_id(), "Camera closed");
        } else {
            warn!(camera_id = %self.camera_id(), "Camera already closed");
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("camera_id", &self.camera_id())
            .field("open", &self.is_open())
            .field("lifecycle", &self.lifecycle_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticBackend;
    use crate::backends::camera::{CameraBackend, IndexRange};
    use crate::session::lifecycle::LifecycleOwner;

    fn open_back_camera(backend: &SyntheticBackend, owner: &LifecycleOwner) -> Camera {
        let device = backend.enumerate_cameras().remove(0);
        let characteristics = backend.characteristics(&device).unwrap();
        let control = backend.open(&device).unwrap();
        Camera::new(device, characteristics, control, owner.subscribe())
    }

    #[test]
    fn test_exposure_state_is_read_fresh() {
        let backend = SyntheticBackend::new();
        let owner = LifecycleOwner::new();
        let camera = open_back_camera(&backend, &owner);

        let state = camera.exposure_state().unwrap();
        assert!(state.supported);
        assert_eq!(state.range, IndexRange::new(-12, 12));
        assert_eq!(state.index, 0);

        camera.set_exposure_compensation_index(5).unwrap();
        assert_eq!(camera.exposure_state().unwrap().index, 5);
        assert!(matches!(
            camera.set_exposure_compensation_index(13),
            Err(BackendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_capture_requires_started_owner() {
        let backend = SyntheticBackend::new();
        let owner = LifecycleOwner::new();
        let camera = open_back_camera(&backend, &owner);

        owner.move_to(LifecycleState::Created);
        assert_eq!(
            camera.capture_still(Some(Size::new(64, 48))).unwrap_err(),
            BackendError::CameraClosed
        );

        owner.move_to(LifecycleState::Started);
        let frame = camera.capture_still(Some(Size::new(64, 48))).unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
    }

    #[test]
    fn test_closed_camera_refuses_work() {
        let backend = SyntheticBackend::new();
        let owner = LifecycleOwner::new();
        let camera = open_back_camera(&backend, &owner);
        assert_eq!(backend.open_cameras(), 1);

        camera.close();
        assert_eq!(backend.open_cameras(), 0);
        assert_eq!(
            camera.exposure_state().unwrap_err(),
            BackendError::CameraClosed
        );
    }
}
