// SPDX-License-Identifier: GPL-3.0-only

use super::camera::Camera;
use super::use_cases::ImageCapture;
use crate::backends::camera::CameraManager;

/// Result of a successful bind
///
/// Starts empty and is replaced as a whole on every rebind; fields are never
/// patched individually.
#[derive(Clone, Default)]
pub struct CameraSetup {
    pub image_capture: Option<ImageCapture>,
    pub camera: Option<Camera>,
    pub camera_manager: Option<CameraManager>,
}

impl CameraSetup {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Setup holding only a capture use case (not yet bound)
    pub fn with_image_capture(image_capture: ImageCapture) -> Self {
        Self {
            image_capture: Some(image_capture),
            ..Self::default()
        }
    }

    pub fn is_bound(&self) -> bool {
        self.camera.as_ref().is_some_and(Camera::is_open)
    }
}

impl std::fmt::Debug for CameraSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSetup")
            .field("image_capture", &self.image_capture)
            .field("camera", &self.camera)
            .field("has_camera_manager", &self.camera_manager.is_some())
            .finish()
    }
}
