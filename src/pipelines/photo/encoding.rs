// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! Frames are rotated upright, compressed to JPEG at the quality of the
//! capture mode and written to their output path.

use crate::backends::camera::types::{CameraFrame, LensFacing, SurfaceRotation};
use crate::constants::CaptureMode;
use crate::errors::PhotoError;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Clockwise rotation that makes a sensor image upright for a target rotation
///
/// Front cameras are mirrored, so the display rotation adds to the sensor
/// orientation instead of cancelling it.
pub fn jpeg_rotation(
    sensor_orientation: SurfaceRotation,
    target_rotation: SurfaceRotation,
    lens_facing: LensFacing,
) -> SurfaceRotation {
    let sensor = sensor_orientation.degrees() as i32;
    let target = target_rotation.degrees() as i32;
    let degrees = match lens_facing {
        LensFacing::Front => sensor + target,
        LensFacing::Back | LensFacing::External => sensor - target,
    };
    SurfaceRotation::from_degrees_int(degrees)
}

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// JPEG encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    quality: u8,
}

impl PhotoEncoder {
    /// Encoder with an explicit JPEG quality (clamped to 1-100)
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn for_mode(mode: CaptureMode) -> Self {
        Self::new(mode.jpeg_quality())
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Rotate a frame clockwise
    pub fn rotate(frame: &CameraFrame, rotation: SurfaceRotation) -> Result<RgbImage, PhotoError> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec()).ok_or_else(
            || {
                PhotoError::EncodingFailed(format!(
                    "{} bytes do not fit a {}x{} RGB frame",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ))
            },
        )?;

        Ok(match rotation {
            SurfaceRotation::Rotation0 => image,
            SurfaceRotation::Rotation90 => image::imageops::rotate90(&image),
            SurfaceRotation::Rotation180 => image::imageops::rotate180(&image),
            SurfaceRotation::Rotation270 => image::imageops::rotate270(&image),
        })
    }

    /// Rotate and compress a frame
    pub fn encode(
        &self,
        frame: &CameraFrame,
        rotation: SurfaceRotation,
    ) -> Result<EncodedImage, PhotoError> {
        let image = Self::rotate(frame, rotation)?;
        debug!(
            width = image.width(),
            height = image.height(),
            %rotation,
            quality = self.quality,
            "Encoding JPEG"
        );

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, self.quality);
        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        Ok(EncodedImage {
            data: buffer,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Write an encoded image, creating the parent directory if needed
    pub fn save(encoded: &EncodedImage, path: &Path) -> Result<PathBuf, PhotoError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &encoded.data)?;

        info!(
            path = %path.display(),
            size = encoded.data.len(),
            width = encoded.width,
            height = encoded.height,
            "Photo saved"
        );
        Ok(path.to_path_buf())
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::for_mode(CaptureMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame(width: u32, height: u32) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: Arc::from(vec![200u8; CameraFrame::expected_len(width, height)]),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_jpeg_rotation() {
        use SurfaceRotation::*;
        assert_eq!(jpeg_rotation(Rotation90, Rotation0, LensFacing::Back), Rotation90);
        assert_eq!(jpeg_rotation(Rotation90, Rotation270, LensFacing::Back), Rotation180);
        assert_eq!(jpeg_rotation(Rotation270, Rotation90, LensFacing::Front), Rotation0);
        assert_eq!(jpeg_rotation(Rotation0, Rotation0, LensFacing::External), Rotation0);
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let encoder = PhotoEncoder::for_mode(CaptureMode::MinimizeLatency);
        assert_eq!(encoder.quality(), 80);

        let encoded = encoder.encode(&frame(32, 16), SurfaceRotation::Rotation90).unwrap();
        assert_eq!((encoded.width, encoded.height), (16, 32));
        // JPEG SOI marker
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_short_frame_fails_to_encode() {
        let mut short = frame(8, 8);
        short.data = Arc::from(vec![0u8; 10]);
        assert!(matches!(
            PhotoEncoder::default().encode(&short, SurfaceRotation::Rotation0),
            Err(PhotoError::EncodingFailed(_))
        ));
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("photo.jpg");
        let encoded = PhotoEncoder::default()
            .encode(&frame(8, 8), SurfaceRotation::Rotation0)
            .unwrap();

        let saved = PhotoEncoder::save(&encoded, &path).unwrap();
        assert_eq!(saved, path);
        assert!(path.exists());
    }
}
