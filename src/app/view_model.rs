// SPDX-License-Identifier: GPL-3.0-only

//! Shared state observed by the capture screen

use crate::session::{CameraSetup, PermissionGate};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Permission state and the current camera setup
///
/// The setup starts empty and is only ever replaced as a whole. Clones share
/// both channels.
#[derive(Clone)]
pub struct MainViewModel {
    permission_gate: PermissionGate,
    camera_setup: Arc<watch::Sender<CameraSetup>>,
}

impl MainViewModel {
    pub fn new(permission_gate: PermissionGate) -> Self {
        let (camera_setup, _) = watch::channel(CameraSetup::empty());
        Self {
            permission_gate,
            camera_setup: Arc::new(camera_setup),
        }
    }

    pub fn permission_gate(&self) -> &PermissionGate {
        &self.permission_gate
    }

    pub fn is_permission_granted(&self) -> bool {
        self.permission_gate.is_granted()
    }

    pub fn subscribe_permission(&self) -> watch::Receiver<bool> {
        self.permission_gate.subscribe()
    }

    /// Snapshot of the current setup
    pub fn camera_setup(&self) -> CameraSetup {
        self.camera_setup.borrow().clone()
    }

    pub fn subscribe_camera_setup(&self) -> watch::Receiver<CameraSetup> {
        self.camera_setup.subscribe()
    }

    pub fn set_camera_setup(&self, setup: CameraSetup) {
        debug!(bound = setup.is_bound(), "Publishing camera setup");
        self.camera_setup.send_replace(setup);
    }
}

impl std::fmt::Debug for MainViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainViewModel")
            .field("permission_granted", &self.is_permission_granted())
            .field("camera_setup", &*self.camera_setup.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ImageCapture, StaticPermissionChecker};

    #[test]
    fn test_initial_state_is_empty() {
        let model = MainViewModel::new(PermissionGate::new(Arc::new(StaticPermissionChecker::granted())));
        assert!(!model.is_permission_granted());
        assert!(model.camera_setup().image_capture.is_none());
        assert!(!model.camera_setup().is_bound());
    }

    #[test]
    fn test_setup_is_replaced_wholesale() {
        let model = MainViewModel::new(PermissionGate::new(Arc::new(StaticPermissionChecker::denied())));
        let mut rx = model.subscribe_camera_setup();

        model.set_camera_setup(CameraSetup::with_image_capture(ImageCapture::builder().build()));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().image_capture.is_some());

        model.set_camera_setup(CameraSetup::empty());
        assert!(model.camera_setup().image_capture.is_none());
    }
}
