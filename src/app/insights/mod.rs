// SPDX-License-Identifier: GPL-3.0-only

//! Resolution and capability diagnostics
//!
//! Read-only queries against camera characteristics. Nothing here touches the
//! bound session.

mod types;

pub use types::{RawSupport, ResolutionReport};

use crate::backends::camera::types::ImageFormat;
use crate::backends::camera::CameraManager;
use crate::constants::HIGH_RESOLUTION_MIN_PLATFORM_LEVEL;
use crate::session::Camera;
use tracing::{debug, warn};

/// Lists the stream sizes a camera supports
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionInspector {
    image_format: ImageFormat,
}

impl ResolutionInspector {
    pub fn new(image_format: ImageFormat) -> Self {
        Self { image_format }
    }

    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }

    /// Sizes advertised by a bound camera
    ///
    /// High-resolution sizes are only reported when the platform level is
    /// unknown or at least [`HIGH_RESOLUTION_MIN_PLATFORM_LEVEL`].
    pub fn inspect(&self, camera: &Camera, platform_level: Option<u32>) -> ResolutionReport {
        let map = &camera.characteristics().stream_configuration_map;
        let output_sizes = map
            .output_sizes(self.image_format)
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        let high_resolution_sizes = reports_high_resolution(platform_level).then(|| {
            map.high_resolution_output_sizes(self.image_format)
                .map(<[_]>::to_vec)
                .unwrap_or_default()
        });

        let report = ResolutionReport {
            camera_id: camera.camera_id().to_string(),
            image_format: self.image_format,
            output_sizes,
            high_resolution_sizes,
            preview_sizes: map.preview_output_sizes(),
        };
        for line in report.as_lines() {
            debug!("{}", line);
        }
        report
    }
}

fn reports_high_resolution(platform_level: Option<u32>) -> bool {
    platform_level.is_none_or(|level| level >= HIGH_RESOLUTION_MIN_PLATFORM_LEVEL)
}

/// RAW capability of every camera the manager knows
///
/// Cameras whose characteristics cannot be read are reported unsupported.
pub fn raw_support(manager: &CameraManager) -> Vec<RawSupport> {
    manager
        .camera_id_list()
        .into_iter()
        .map(|camera_id| {
            let supported = match manager.camera_characteristics(&camera_id) {
                Ok(characteristics) => characteristics.supports_raw(),
                Err(err) => {
                    warn!(camera_id = %camera_id, error = %err, "Cannot read camera characteristics");
                    false
                }
            };
            debug!(camera_id = %camera_id, supported, "RAW capability");
            RawSupport {
                camera_id,
                supported,
            }
        })
        .collect()
}
