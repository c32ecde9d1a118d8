// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Camera backend type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackendType {
    /// Video4Linux2 devices under /dev/video*
    #[default]
    V4l2,
    /// In-memory camera rendering a test pattern
    Synthetic,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Direction the lens faces relative to the device screen
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LensFacing {
    #[default]
    Back,
    Front,
    /// Detachable camera (USB webcams)
    External,
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Back => write!(f, "back"),
            LensFacing::Front => write!(f, "front"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

/// Chooses which camera a session binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSelector {
    /// First camera with the given lens facing
    Facing(LensFacing),
    /// Camera at a position in the enumeration order
    Index(usize),
}

impl CameraSelector {
    pub const DEFAULT_BACK_CAMERA: CameraSelector = CameraSelector::Facing(LensFacing::Back);
    pub const DEFAULT_FRONT_CAMERA: CameraSelector = CameraSelector::Facing(LensFacing::Front);

    /// Pick a camera from an enumerated list
    ///
    /// A facing request falls back to the first external camera when no
    /// camera reports that facing, since desktop webcams are all external.
    pub fn select<'a>(&self, devices: &'a [CameraDevice]) -> Option<&'a CameraDevice> {
        match *self {
            CameraSelector::Index(index) => devices.get(index),
            CameraSelector::Facing(facing) => devices
                .iter()
                .find(|d| d.lens_facing == facing)
                .or_else(|| {
                    devices
                        .iter()
                        .find(|d| d.lens_facing == LensFacing::External)
                }),
        }
    }
}

impl Default for CameraSelector {
    fn default() -> Self {
        Self::DEFAULT_BACK_CAMERA
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Stable camera id (e.g. "video0" or "0")
    pub id: String,
    pub name: String,
    pub path: String, // Device node for V4L2, empty for synthetic cameras
    pub lens_facing: LensFacing,
    pub driver: Option<String>,
}

/// Output size of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Image format of a stream output
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFormat {
    /// Flexible YUV (any planar, semi-planar or packed YUV layout)
    #[default]
    Yuv,
    /// Compressed JPEG frames
    Jpeg,
    /// Packed RGB
    Rgb,
    /// Unprocessed Bayer sensor data
    RawSensor,
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Yuv => write!(f, "YUV_420_888"),
            ImageFormat::Jpeg => write!(f, "JPEG"),
            ImageFormat::Rgb => write!(f, "RGB_888"),
            ImageFormat::RawSensor => write!(f, "RAW_SENSOR"),
        }
    }
}

/// Output sizes advertised per image format
///
/// High-resolution sizes are kept apart from regular sizes: they are valid
/// outputs but cannot be streamed at burst rates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfigurationMap {
    output_sizes: BTreeMap<ImageFormat, Vec<Size>>,
    high_resolution_output_sizes: BTreeMap<ImageFormat, Vec<Size>>,
}

impl StreamConfigurationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a regular output size (duplicates are ignored)
    pub fn add_output_size(&mut self, format: ImageFormat, size: Size) {
        let sizes = self.output_sizes.entry(format).or_default();
        if !sizes.contains(&size) {
            sizes.push(size);
        }
    }

    /// Register a high-resolution-only output size (duplicates are ignored)
    pub fn add_high_resolution_output_size(&mut self, format: ImageFormat, size: Size) {
        let sizes = self.high_resolution_output_sizes.entry(format).or_default();
        if !sizes.contains(&size) {
            sizes.push(size);
        }
    }

    /// Formats with at least one regular or high-resolution size
    pub fn output_formats(&self) -> Vec<ImageFormat> {
        let mut formats: Vec<ImageFormat> = self
            .output_sizes
            .keys()
            .chain(self.high_resolution_output_sizes.keys())
            .copied()
            .collect();
        formats.sort();
        formats.dedup();
        formats
    }

    pub fn output_sizes(&self, format: ImageFormat) -> Option<&[Size]> {
        self.output_sizes.get(&format).map(Vec::as_slice)
    }

    pub fn high_resolution_output_sizes(&self, format: ImageFormat) -> Option<&[Size]> {
        self.high_resolution_output_sizes
            .get(&format)
            .map(Vec::as_slice)
    }

    /// Sizes a preview surface can use: every regular size, largest first
    pub fn preview_output_sizes(&self) -> Vec<Size> {
        let mut sizes: Vec<Size> = self.output_sizes.values().flatten().copied().collect();
        sizes.sort_by(|a, b| b.area().cmp(&a.area()).then(b.width.cmp(&a.width)));
        sizes.dedup();
        sizes
    }

    /// Largest size usable for still capture
    pub fn largest_capture_size(&self, include_high_resolution: bool) -> Option<Size> {
        let regular = self
            .output_sizes
            .iter()
            .filter(|(format, _)| **format != ImageFormat::RawSensor)
            .flat_map(|(_, sizes)| sizes.iter());
        let high_res = self
            .high_resolution_output_sizes
            .iter()
            .filter(|(format, _)| include_high_resolution && **format != ImageFormat::RawSensor)
            .flat_map(|(_, sizes)| sizes.iter());
        regular.chain(high_res).copied().max_by_key(Size::area)
    }
}

/// Optional capabilities a camera advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BackwardCompatible,
    ManualSensor,
    Raw,
    BurstCapture,
}

/// Exact fraction, always stored in lowest terms with a positive denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    pub fn new(numerator: i32, denominator: i32) -> Self {
        if denominator == 0 {
            return Self {
                numerator: 0,
                denominator: 1,
            };
        }
        let divisor = gcd(numerator.unsigned_abs(), denominator.unsigned_abs()).max(1) as i32;
        let sign = if denominator < 0 { -1 } else { 1 };
        Self {
            numerator: sign * numerator / divisor,
            denominator: sign * denominator / divisor,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Inclusive integer range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub lower: i32,
    pub upper: i32,
}

impl IndexRange {
    /// Create a range; swapped bounds are reordered
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.lower..=self.upper).contains(&value)
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.lower, self.upper)
    }

    /// A `[0, 0]` range means the control cannot move
    pub fn is_empty(&self) -> bool {
        self.lower == 0 && self.upper == 0
    }
}

impl std::fmt::Display for IndexRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Static exposure compensation limits of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureCompensationInfo {
    /// Supported index range
    pub range: IndexRange,
    /// EV change of one index step
    pub step: Rational,
}

/// Snapshot of a camera's exposure compensation
///
/// Always read fresh from the bound camera; never cached across reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureState {
    /// Current compensation index
    pub index: i32,
    /// Supported index range
    pub range: IndexRange,
    /// EV change of one index step
    pub step: Rational,
    /// Whether the camera supports compensation at all
    pub supported: bool,
}

impl ExposureState {
    /// State reported by cameras without exposure compensation
    pub fn unsupported() -> Self {
        Self {
            index: 0,
            range: IndexRange::new(0, 0),
            step: Rational::new(0, 1),
            supported: false,
        }
    }

    /// Current compensation in EV
    pub fn ev(&self) -> f64 {
        self.index as f64 * self.step.as_f64()
    }

    /// Human-readable description, one line per property
    pub fn as_lines(&self) -> Vec<String> {
        vec![
            format!("Exposure compensation supported: {}", self.supported),
            format!("Exposure compensation index: {}", self.index),
            format!("Exposure compensation range: {}", self.range),
            format!("Exposure compensation step size: {}", self.step),
        ]
    }
}

/// Rotation of an output surface relative to the device's natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SurfaceRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl SurfaceRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SurfaceRotation::Rotation90,
            180 => SurfaceRotation::Rotation180,
            270 => SurfaceRotation::Rotation270,
            _ => SurfaceRotation::Rotation0,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SurfaceRotation::Rotation0 => 0,
            SurfaceRotation::Rotation90 => 90,
            SurfaceRotation::Rotation180 => 180,
            SurfaceRotation::Rotation270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            SurfaceRotation::Rotation90 | SurfaceRotation::Rotation270
        )
    }
}

impl std::fmt::Display for SurfaceRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Static description of a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCharacteristics {
    pub camera_id: String,
    pub lens_facing: LensFacing,
    /// Clockwise angle the sensor image must be rotated to be upright
    pub sensor_orientation: SurfaceRotation,
    pub stream_configuration_map: StreamConfigurationMap,
    pub capabilities: Vec<Capability>,
    /// None when exposure compensation is not supported
    pub exposure_compensation: Option<ExposureCompensationInfo>,
    /// Settable exposure time range, None when manual exposure is unsupported
    pub exposure_time_range: Option<(Duration, Duration)>,
    pub has_auto_focus: bool,
}

impl CameraCharacteristics {
    pub fn supports_raw(&self) -> bool {
        self.capabilities.contains(&Capability::Raw)
    }

    pub fn supports_exposure_compensation(&self) -> bool {
        self.exposure_compensation
            .map(|info| !info.range.is_empty() && !info.step.is_zero())
            .unwrap_or(false)
    }
}

/// Normalized point on the preview (0.0-1.0 on both axes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeteringPoint {
    pub x: f32,
    pub y: f32,
}

/// Focus and metering request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusMeteringAction {
    pub point: MeteringPoint,
    /// Cancel the action automatically after this delay
    pub auto_cancel: Option<Duration>,
}

impl FocusMeteringAction {
    /// Focus on the center of the frame
    pub fn centered() -> Self {
        Self {
            point: MeteringPoint { x: 0.5, y: 0.5 },
            auto_cancel: None,
        }
    }

    pub fn with_auto_cancel(mut self, delay: Duration) -> Self {
        self.auto_cancel = Some(delay);
        self
    }
}

/// A single still frame, always packed RGB (3 bytes per pixel)
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Expected byte length for the frame dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// The camera does not expose the requested control
    ControlNotSupported(String),
    /// Argument outside what the camera accepts
    InvalidArgument(String),
    /// A session is already bound
    Busy(String),
    /// Camera closed or its lifecycle is not started
    CameraClosed,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::ControlNotSupported(msg) => write!(f, "Control not supported: {}", msg),
            BackendError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            BackendError::Busy(msg) => write!(f, "Camera busy: {}", msg),
            BackendError::CameraClosed => write!(f, "Camera is closed"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
