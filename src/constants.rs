// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application name, used for the output folder and config directory
pub const APP_NAME: &str = "camera-session";

/// chrono format for photo file names (`yyyy-MM-dd-HH-mm-ss-SSS`)
pub const FILENAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

/// Extension for captured photos
pub const JPG_FILE_EXTENSION: &str = "jpg";

/// Request code used for the camera permission request cycle
pub const REQUEST_CODE_PERMISSIONS: i32 = 10;

/// Delay before a started focus/metering action is cancelled automatically
pub const AUTO_FOCUS_INTERVAL: Duration = Duration::from_secs(2);

/// Platform level from which high-resolution output sizes can be queried
pub const HIGH_RESOLUTION_MIN_PLATFORM_LEVEL: u32 = 23;

/// Frame sizes whose best frame rate stays below this are high-resolution only
/// (they cannot sustain burst capture rates)
pub const HIGH_RESOLUTION_MAX_FPS: u32 = 20;

/// Frames dropped after stream start so auto exposure can settle
pub const CAPTURE_WARMUP_FRAMES: usize = 4;

/// Number of mmap buffers requested from V4L2 drivers
pub const V4L2_BUFFER_COUNT: u32 = 4;

/// V4L2 exposure bias is expressed in 0.001 EV units
pub const EV_BIAS_UNITS_PER_EV: i32 = 1000;

/// How long the CLI waits for a bind to resolve
pub const BIND_TIMEOUT: Duration = Duration::from_secs(5);

/// Still-capture mode of the image capture use case
///
/// Controls which output size is captured and how hard the JPEG is compressed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Largest available size, minimal compression (default)
    #[default]
    #[value(name = "quality")]
    MaximizeQuality,
    /// Largest size that streams at full rate, faster encoding
    #[value(name = "latency")]
    MinimizeLatency,
}

impl CaptureMode {
    /// All modes for UI iteration
    pub const ALL: [CaptureMode; 2] = [CaptureMode::MaximizeQuality, CaptureMode::MinimizeLatency];

    /// JPEG quality (0-100) used for this mode
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            CaptureMode::MaximizeQuality => 98,
            CaptureMode::MinimizeLatency => 80,
        }
    }

    /// Whether high-resolution-only sizes may be used for capture
    pub fn allows_high_resolution(&self) -> bool {
        matches!(self, CaptureMode::MaximizeQuality)
    }

    /// Display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureMode::MaximizeQuality => "Maximize quality",
            CaptureMode::MinimizeLatency => "Minimize latency",
        }
    }
}
