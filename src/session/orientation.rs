// SPDX-License-Identifier: GPL-3.0-only

//! Device orientation tracking
//!
//! Physical orientation (degrees clockwise from natural) is turned into the
//! surface rotation the capture use case should record.

use super::use_cases::ImageCapture;
use crate::backends::camera::types::SurfaceRotation;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Orientation value reported while the device lies flat
pub const ORIENTATION_UNKNOWN: i32 = -1;

/// Map a physical orientation to a target rotation
///
/// Each quadrant is centered on its right angle, so a device held at 100°
/// already counts as rotated 90° clockwise.
pub fn rotation_for_orientation(degrees: i32) -> SurfaceRotation {
    match degrees {
        45..=134 => SurfaceRotation::Rotation270,
        135..=224 => SurfaceRotation::Rotation180,
        225..=314 => SurfaceRotation::Rotation90,
        _ => SurfaceRotation::Rotation0,
    }
}

/// Source of physical orientation readings
pub trait OrientationSource: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<i32>;
}

/// Orientation set by hand (no sensor on the host)
#[derive(Debug)]
pub struct ManualOrientationSource {
    orientation: watch::Sender<i32>,
}

impl ManualOrientationSource {
    pub fn new(degrees: i32) -> Self {
        let (orientation, _) = watch::channel(degrees);
        Self { orientation }
    }

    pub fn set_orientation(&self, degrees: i32) {
        self.orientation.send_replace(degrees);
    }
}

impl Default for ManualOrientationSource {
    fn default() -> Self {
        Self::new(0)
    }
}

impl OrientationSource for ManualOrientationSource {
    fn subscribe(&self) -> watch::Receiver<i32> {
        self.orientation.subscribe()
    }
}

/// Keeps a capture use case's target rotation in step with the device
///
/// Disabled on drop.
#[derive(Debug)]
pub struct OrientationEventListener {
    task: JoinHandle<()>,
}

impl OrientationEventListener {
    /// Start listening; must be called inside a tokio runtime
    pub fn enable(source: &dyn OrientationSource, image_capture: ImageCapture) -> Self {
        let mut orientation = source.subscribe();
        let task = tokio::spawn(async move {
            loop {
                let degrees = *orientation.borrow_and_update();
                if degrees != ORIENTATION_UNKNOWN {
                    let rotation = rotation_for_orientation(degrees);
                    if image_capture.target_rotation() != rotation {
                        debug!(degrees, %rotation, "Updating capture target rotation");
                        image_capture.set_target_rotation(rotation);
                    }
                }
                if orientation.changed().await.is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    pub fn disable(&self) {
        self.task.abort();
    }
}

impl Drop for OrientationEventListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_quadrants() {
        assert_eq!(rotation_for_orientation(0), SurfaceRotation::Rotation0);
        assert_eq!(rotation_for_orientation(44), SurfaceRotation::Rotation0);
        assert_eq!(rotation_for_orientation(45), SurfaceRotation::Rotation270);
        assert_eq!(rotation_for_orientation(134), SurfaceRotation::Rotation270);
        assert_eq!(rotation_for_orientation(135), SurfaceRotation::Rotation180);
        assert_eq!(rotation_for_orientation(224), SurfaceRotation::Rotation180);
        assert_eq!(rotation_for_orientation(225), SurfaceRotation::Rotation90);
        assert_eq!(rotation_for_orientation(314), SurfaceRotation::Rotation90);
        assert_eq!(rotation_for_orientation(315), SurfaceRotation::Rotation0);
        assert_eq!(rotation_for_orientation(359), SurfaceRotation::Rotation0);
    }

    #[tokio::test]
    async fn test_listener_updates_target_rotation() {
        let source = ManualOrientationSource::new(0);
        let capture = ImageCapture::builder().build();
        let listener = OrientationEventListener::enable(&source, capture.clone());

        source.set_orientation(90);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(capture.target_rotation(), SurfaceRotation::Rotation270);

        // Flat device keeps the last rotation
        source.set_orientation(ORIENTATION_UNKNOWN);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(capture.target_rotation(), SurfaceRotation::Rotation270);

        listener.disable();
    }
}
