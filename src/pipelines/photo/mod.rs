// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture pipeline
//!
//! ```text
//! ImageCapture → Rotation → JPEG Encoding → Disk I/O
//!       ↓
//! CaptureCoordinator (paths, callbacks, logging)
//! ```
//!
//! Encoding and disk I/O run on the capture executor thread, never on the
//! async runtime.

pub mod capture;
pub mod encoding;

pub use capture::{CaptureCoordinator, CaptureTicket};
pub use encoding::{EncodedImage, PhotoEncoder, jpeg_rotation};

use crate::backends::camera::types::{CameraFrame, SurfaceRotation};
use crate::constants::CaptureMode;
use crate::errors::PhotoError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Encode-and-save stage of a still capture
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            encoder: PhotoEncoder::for_mode(mode),
        }
    }

    /// Rotate, encode and write a frame to `path`
    pub fn process(
        &self,
        frame: &CameraFrame,
        rotation: SurfaceRotation,
        path: &Path,
    ) -> Result<PathBuf, PhotoError> {
        let encoded = self.encoder.encode(frame, rotation)?;
        let saved = PhotoEncoder::save(&encoded, path)?;
        debug!(
            latency_ms = frame.captured_at.elapsed().as_millis() as u64,
            "Photo pipeline complete"
        );
        Ok(saved)
    }
}

impl Default for PhotoPipeline {
    fn default() -> Self {
        Self::new(CaptureMode::default())
    }
}
