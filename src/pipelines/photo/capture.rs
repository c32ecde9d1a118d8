// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture coordination
//!
//! Turns a shutter press into a capture request against whatever capture use
//! case is currently bound, writing to a timestamped file.

use crate::errors::PhotoError;
use crate::session::{CameraExecutor, CameraSetup, OutputFileOptions, OutputFileResults};
use crate::storage;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Pending capture
///
/// Dropping the ticket does not cancel the capture.
#[derive(Debug)]
pub struct CaptureTicket {
    path: PathBuf,
    receiver: oneshot::Receiver<Result<PathBuf, PhotoError>>,
}

impl CaptureTicket {
    /// Path the photo is written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the capture to finish
    pub async fn wait(self) -> Result<PathBuf, PhotoError> {
        self.receiver
            .await
            .map_err(|_| PhotoError::CaptureFailed("capture was dropped".to_string()))?
    }
}

/// Issues capture requests for the current camera setup
#[derive(Debug, Clone)]
pub struct CaptureCoordinator {
    output_directory: PathBuf,
}

impl CaptureCoordinator {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Request a still capture
    ///
    /// Returns `None` without doing anything when the setup has no capture
    /// use case. Requests are never de-duplicated.
    pub fn take_photo(
        &self,
        setup: &CameraSetup,
        executor: &CameraExecutor,
    ) -> Option<CaptureTicket> {
        let Some(image_capture) = setup.image_capture.as_ref() else {
            debug!("No capture use case, ignoring photo request");
            return None;
        };

        let path = storage::photo_file_path(&self.output_directory, chrono::Local::now());
        log_exposure(setup);

        let (sender, receiver) = oneshot::channel();
        image_capture.take_picture(
            OutputFileOptions::new(&path),
            executor,
            move |result: Result<OutputFileResults, PhotoError>| {
                match &result {
                    Ok(output) => {
                        info!(path = %output.saved_path.display(), "Photo capture succeeded")
                    }
                    Err(err) => error!(error = %err, "Photo capture failed"),
                }
                let _ = sender.send(result.map(|output| output.saved_path));
            },
        );

        Some(CaptureTicket { path, receiver })
    }
}

fn log_exposure(setup: &CameraSetup) {
    let Some(camera) = setup.camera.as_ref() else {
        return;
    };
    match camera.exposure_state() {
        Ok(state) => {
            for line in state.as_lines() {
                info!("{}", line);
            }
        }
        Err(err) => debug!(%err, "Exposure state unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_setup_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CameraExecutor::new().unwrap();
        let coordinator = CaptureCoordinator::new(dir.path());

        assert!(coordinator.take_photo(&CameraSetup::empty(), &executor).is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unbound_capture_fails_with_camera_closed() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CameraExecutor::new().unwrap();
        let coordinator = CaptureCoordinator::new(dir.path());
        let setup = CameraSetup::with_image_capture(
            crate::session::ImageCapture::builder().build(),
        );

        let ticket = coordinator.take_photo(&setup, &executor).unwrap();
        assert!(ticket.path().starts_with(dir.path()));
        assert_eq!(ticket.wait().await, Err(PhotoError::CameraClosed));
    }
}
