// SPDX-License-Identifier: GPL-3.0-only

//! Types for resolution and capability diagnostics.

use crate::backends::camera::types::{ImageFormat, Size};
use serde::Serialize;

/// Stream sizes a bound camera advertises
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub camera_id: String,
    /// Format the output sizes were queried for
    pub image_format: ImageFormat,
    /// Regular output sizes for `image_format`
    pub output_sizes: Vec<Size>,
    /// High-resolution-only sizes; `None` when the platform is too old to
    /// report them
    pub high_resolution_sizes: Option<Vec<Size>>,
    /// Sizes a preview surface may be given, largest first
    pub preview_sizes: Vec<Size>,
}

impl ResolutionReport {
    /// Regular sizes followed by any high-resolution sizes
    pub fn all_output_sizes(&self) -> Vec<Size> {
        let mut sizes = self.output_sizes.clone();
        if let Some(high_res) = &self.high_resolution_sizes {
            sizes.extend(high_res.iter().copied());
        }
        sizes
    }

    /// Human-readable report, one size per line
    pub fn as_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Camera {} output sizes ({}):",
            self.camera_id, self.image_format
        )];
        lines.extend(self.output_sizes.iter().map(|size| format!("  {}", size)));

        match &self.high_resolution_sizes {
            Some(sizes) if !sizes.is_empty() => {
                lines.push("High resolution sizes:".to_string());
                lines.extend(sizes.iter().map(|size| format!("  {}", size)));
            }
            Some(_) => lines.push("High resolution sizes: none".to_string()),
            None => lines.push("High resolution sizes: not reported".to_string()),
        }

        lines.push("Preview sizes:".to_string());
        lines.extend(self.preview_sizes.iter().map(|size| format!("  {}", size)));
        lines
    }
}

/// Whether a camera advertises RAW sensor output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawSupport {
    pub camera_id: String,
    pub supported: bool,
}

impl std::fmt::Display for RawSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.supported { "supported" } else { "not supported" };
        write!(f, "Camera {}: RAW {}", self.camera_id, verdict)
    }
}
