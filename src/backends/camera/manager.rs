// SPDX-License-Identifier: GPL-3.0-only

//! Camera manager
//!
//! The manager provides:
//! - Thread-safe, cloneable access to one backend
//! - Camera id lookup and characteristics queries
//! - Opening cameras for the session layer

use super::types::*;
use super::{CameraBackend, CameraControl};
use std::sync::Arc;
use tracing::{debug, info};

/// Camera manager
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct CameraManager {
    backend: Arc<dyn CameraBackend>,
}

impl CameraManager {
    /// Create a manager over a backend
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        info!(backend = %backend.backend_type(), "Creating camera manager");
        Self { backend }
    }

    /// Get the backend type
    pub fn backend_type(&self) -> CameraBackendType {
        self.backend.backend_type()
    }

    /// Check if the backend is available on this system
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Platform API level of the backend
    pub fn platform_level(&self) -> Option<u32> {
        self.backend.platform_level()
    }

    /// Enumerate available cameras
    pub fn cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        let cameras = self.backend.enumerate_cameras();
        if cameras.is_empty() {
            Err(BackendError::DeviceNotFound("No cameras found".to_string()))
        } else {
            Ok(cameras)
        }
    }

    /// Ids of every camera the backend knows about
    pub fn camera_id_list(&self) -> Vec<String> {
        self.backend
            .enumerate_cameras()
            .into_iter()
            .map(|device| device.id)
            .collect()
    }

    /// Look up a camera by id
    pub fn device(&self, camera_id: &str) -> BackendResult<CameraDevice> {
        self.backend
            .enumerate_cameras()
            .into_iter()
            .find(|device| device.id == camera_id)
            .ok_or_else(|| BackendError::DeviceNotFound(camera_id.to_string()))
    }

    /// Characteristics of a camera by id
    pub fn camera_characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics> {
        let device = self.device(camera_id)?;
        self.characteristics(&device)
    }

    /// Characteristics of an already enumerated camera
    pub fn characteristics(&self, device: &CameraDevice) -> BackendResult<CameraCharacteristics> {
        debug!(camera_id = %device.id, "Querying camera characteristics");
        self.backend.characteristics(device)
    }

    /// Open a camera for control and capture
    pub fn open(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraControl>> {
        info!(camera_id = %device.id, name = %device.name, "Opening camera");
        self.backend.open(device)
    }
}

impl std::fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraManager")
            .field("backend_type", &self.backend.backend_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::{SyntheticBackend, SyntheticCameraSpec};

    #[test]
    fn test_camera_lookup() {
        let manager = CameraManager::new(Arc::new(SyntheticBackend::new()));
        assert_eq!(manager.camera_id_list(), vec!["0".to_string(), "1".to_string()]);
        assert_eq!(manager.device("1").map(|d| d.lens_facing), Ok(LensFacing::Front));
        assert!(matches!(
            manager.camera_characteristics("9"),
            Err(BackendError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_empty_backend_reports_no_cameras() {
        let backend = SyntheticBackend::with_cameras(Vec::<SyntheticCameraSpec>::new());
        let manager = CameraManager::new(Arc::new(backend));
        assert!(matches!(
            manager.cameras(),
            Err(BackendError::DeviceNotFound(_))
        ));
    }
}
