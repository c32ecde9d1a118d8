// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! An in-memory camera that renders a gradient test pattern. Sizes,
//! capabilities and exposure limits are configurable per camera, and every
//! control call is recorded so sessions can be inspected without hardware.
//! The pattern brightens or darkens with the applied exposure compensation.

use super::types::*;
use super::{CameraBackend, CameraControl};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Description of one synthetic camera
#[derive(Debug, Clone)]
pub struct SyntheticCameraSpec {
    pub device: CameraDevice,
    pub characteristics: CameraCharacteristics,
    pub initial_exposure_index: i32,
    pub fail_open: bool,
    pub fail_capture: bool,
}

impl SyntheticCameraSpec {
    /// Create a camera with no sizes and no optional features
    pub fn new(id: &str, name: &str, lens_facing: LensFacing) -> Self {
        Self {
            device: CameraDevice {
                id: id.to_string(),
                name: name.to_string(),
                path: String::new(),
                lens_facing,
                driver: Some("synthetic".to_string()),
            },
            characteristics: CameraCharacteristics {
                camera_id: id.to_string(),
                lens_facing,
                sensor_orientation: SurfaceRotation::Rotation0,
                stream_configuration_map: StreamConfigurationMap::new(),
                capabilities: vec![Capability::BackwardCompatible],
                exposure_compensation: None,
                exposure_time_range: None,
                has_auto_focus: false,
            },
            initial_exposure_index: 0,
            fail_open: false,
            fail_capture: false,
        }
    }

    /// Phone-style rear camera: ±2 EV in 1/6 EV steps, RAW, autofocus
    pub fn back_camera() -> Self {
        Self::new("0", "Synthetic Back Camera", LensFacing::Back)
            .with_output_sizes(
                ImageFormat::Yuv,
                &[Size::new(1920, 1080), Size::new(1280, 720), Size::new(640, 480)],
            )
            .with_output_sizes(ImageFormat::Jpeg, &[Size::new(1920, 1080), Size::new(1280, 720)])
            .with_output_sizes(ImageFormat::RawSensor, &[Size::new(4000, 3000)])
            .with_high_resolution_sizes(ImageFormat::Yuv, &[Size::new(4000, 3000)])
            .with_exposure(IndexRange::new(-12, 12), Rational::new(1, 6))
            .with_exposure_time_range(Duration::from_micros(100), Duration::from_secs(1))
            .with_capability(Capability::Raw)
            .with_capability(Capability::ManualSensor)
            .with_sensor_orientation(SurfaceRotation::Rotation90)
            .with_auto_focus()
    }

    /// Fixed-focus front camera without exposure compensation
    pub fn front_camera() -> Self {
        Self::new("1", "Synthetic Front Camera", LensFacing::Front)
            .with_output_sizes(ImageFormat::Yuv, &[Size::new(1280, 720), Size::new(640, 480)])
            .with_output_sizes(ImageFormat::Jpeg, &[Size::new(1280, 720)])
            .with_sensor_orientation(SurfaceRotation::Rotation270)
    }

    pub fn with_output_sizes(mut self, format: ImageFormat, sizes: &[Size]) -> Self {
        for size in sizes {
            self.characteristics
                .stream_configuration_map
                .add_output_size(format, *size);
        }
        self
    }

    pub fn with_high_resolution_sizes(mut self, format: ImageFormat, sizes: &[Size]) -> Self {
        for size in sizes {
            self.characteristics
                .stream_configuration_map
                .add_high_resolution_output_size(format, *size);
        }
        self
    }

    pub fn with_exposure(mut self, range: IndexRange, step: Rational) -> Self {
        self.characteristics.exposure_compensation = Some(ExposureCompensationInfo { range, step });
        self
    }

    pub fn without_exposure(mut self) -> Self {
        self.characteristics.exposure_compensation = None;
        self
    }

    pub fn with_exposure_time_range(mut self, min: Duration, max: Duration) -> Self {
        self.characteristics.exposure_time_range = Some((min, max));
        self
    }

    pub fn with_initial_exposure_index(mut self, index: i32) -> Self {
        self.initial_exposure_index = index;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.characteristics.capabilities.contains(&capability) {
            self.characteristics.capabilities.push(capability);
        }
        self
    }

    pub fn with_sensor_orientation(mut self, rotation: SurfaceRotation) -> Self {
        self.characteristics.sensor_orientation = rotation;
        self
    }

    pub fn with_auto_focus(mut self) -> Self {
        self.characteristics.has_auto_focus = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }
}

/// Recorded control activity, shared by the backend and its opened cameras
#[derive(Debug, Default)]
struct SyntheticState {
    exposure_index: HashMap<String, i32>,
    applied_exposures: Vec<(String, i32)>,
    exposure_time: HashMap<String, Duration>,
    open_cameras: usize,
    focus_requests: usize,
    focus_cancels: usize,
    captures: usize,
}

/// Synthetic backend
///
/// Clones share recorded state, so a test can keep a clone while the
/// session layer owns another.
#[derive(Clone)]
pub struct SyntheticBackend {
    cameras: Arc<Vec<SyntheticCameraSpec>>,
    platform_level: Option<u32>,
    available: bool,
    state: Arc<Mutex<SyntheticState>>,
}

impl SyntheticBackend {
    /// Back and front camera
    pub fn new() -> Self {
        Self::with_cameras(vec![
            SyntheticCameraSpec::back_camera(),
            SyntheticCameraSpec::front_camera(),
        ])
    }

    pub fn with_cameras(cameras: impl Into<Vec<SyntheticCameraSpec>>) -> Self {
        let cameras: Vec<SyntheticCameraSpec> = cameras.into();
        let exposure_index = cameras
            .iter()
            .map(|spec| (spec.device.id.clone(), spec.initial_exposure_index))
            .collect();
        Self {
            cameras: Arc::new(cameras),
            platform_level: None,
            available: true,
            state: Arc::new(Mutex::new(SyntheticState {
                exposure_index,
                ..SyntheticState::default()
            })),
        }
    }

    /// Report a platform level (gates high-resolution queries)
    pub fn with_platform_level(mut self, level: Option<u32>) -> Self {
        self.platform_level = level;
        self
    }

    /// Mark the backend unavailable (provider acquisition fails)
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyntheticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spec(&self, camera_id: &str) -> BackendResult<&SyntheticCameraSpec> {
        self.cameras
            .iter()
            .find(|spec| spec.device.id == camera_id)
            .ok_or_else(|| BackendError::DeviceNotFound(camera_id.to_string()))
    }

    /// Current exposure index of a camera
    pub fn exposure_index(&self, camera_id: &str) -> Option<i32> {
        self.lock().exposure_index.get(camera_id).copied()
    }

    /// Every exposure index applied so far, in order
    pub fn applied_exposures(&self) -> Vec<(String, i32)> {
        self.lock().applied_exposures.clone()
    }

    /// Last manual exposure time applied to a camera
    pub fn exposure_time(&self, camera_id: &str) -> Option<Duration> {
        self.lock().exposure_time.get(camera_id).copied()
    }

    /// Number of cameras currently open
    pub fn open_cameras(&self) -> usize {
        self.lock().open_cameras
    }

    /// Number of focus/metering actions started and cancelled
    pub fn focus_activity(&self) -> (usize, usize) {
        let state = self.lock();
        (state.focus_requests, state.focus_cancels)
    }

    /// Number of still frames rendered
    pub fn captures(&self) -> usize {
        self.lock().captures
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SyntheticBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.cameras.iter().map(|spec| spec.device.clone()).collect()
    }

    fn characteristics(&self, device: &CameraDevice) -> BackendResult<CameraCharacteristics> {
        Ok(self.spec(&device.id)?.characteristics.clone())
    }

    fn open(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraControl>> {
        let spec = self.spec(&device.id)?;
        if spec.fail_open {
            return Err(BackendError::InitializationFailed(format!(
                "{} refused to open",
                device.name
            )));
        }

        self.lock().open_cameras += 1;
        debug!(camera_id = %device.id, "Synthetic camera opened");

        Ok(Box::new(SyntheticControl {
            spec: spec.clone(),
            backend: self.clone(),
            open: true,
        }))
    }

    fn platform_level(&self) -> Option<u32> {
        self.platform_level
    }
}

/// Opened synthetic camera
struct SyntheticControl {
    spec: SyntheticCameraSpec,
    backend: SyntheticBackend,
    open: bool,
}

impl SyntheticControl {
    fn id(&self) -> &str {
        &self.spec.device.id
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::CameraClosed)
        }
    }

    fn render_pattern(&self, size: Size) -> CameraFrame {
        let ev = match self.spec.characteristics.exposure_compensation {
            Some(info) => {
                let index = self.backend.exposure_index(self.id()).unwrap_or(0);
                index as f64 * info.step.as_f64()
            }
            None => 0.0,
        };
        let gain = 2f64.powf(ev);

        let mut data = Vec::with_capacity(CameraFrame::expected_len(size.width, size.height));
        for y in 0..size.height {
            for x in 0..size.width {
                let r = x * 255 / size.width.max(1);
                let g = y * 255 / size.height.max(1);
                let b = 128u32;
                for channel in [r, g, b] {
                    data.push((channel as f64 * gain).clamp(0.0, 255.0) as u8);
                }
            }
        }

        CameraFrame {
            width: size.width,
            height: size.height,
            data: Arc::from(data),
            captured_at: Instant::now(),
        }
    }
}

impl CameraControl for SyntheticControl {
    fn exposure_compensation_index(&self) -> BackendResult<i32> {
        self.ensure_open()?;
        if self.spec.characteristics.exposure_compensation.is_none() {
            return Err(BackendError::ControlNotSupported(
                "exposure compensation".to_string(),
            ));
        }
        Ok(self.backend.exposure_index(self.id()).unwrap_or(0))
    }

    fn set_exposure_compensation_index(&mut self, index: i32) -> BackendResult<()> {
        self.ensure_open()?;
        let Some(info) = self.spec.characteristics.exposure_compensation else {
            return Err(BackendError::ControlNotSupported(
                "exposure compensation".to_string(),
            ));
        };
        if !info.range.contains(index) {
            return Err(BackendError::InvalidArgument(format!(
                "exposure index {} outside {}",
                index, info.range
            )));
        }

        let id = self.id().to_string();
        let mut state = self.backend.lock();
        state.exposure_index.insert(id.clone(), index);
        state.applied_exposures.push((id, index));
        Ok(())
    }

    fn set_exposure_time(&mut self, exposure: Duration) -> BackendResult<()> {
        self.ensure_open()?;
        let Some((min, max)) = self.spec.characteristics.exposure_time_range else {
            return Err(BackendError::ControlNotSupported("exposure time".to_string()));
        };
        let id = self.id().to_string();
        self.backend
            .lock()
            .exposure_time
            .insert(id, exposure.clamp(min, max));
        Ok(())
    }

    fn start_focus_and_metering(&mut self, action: &FocusMeteringAction) -> BackendResult<()> {
        self.ensure_open()?;
        if !self.spec.characteristics.has_auto_focus {
            return Err(BackendError::ControlNotSupported("auto focus".to_string()));
        }
        debug!(x = action.point.x, y = action.point.y, "Synthetic focus started");
        self.backend.lock().focus_requests += 1;
        Ok(())
    }

    fn cancel_focus_and_metering(&mut self) -> BackendResult<()> {
        self.ensure_open()?;
        self.backend.lock().focus_cancels += 1;
        Ok(())
    }

    fn capture_still(&mut self, size: Option<Size>) -> BackendResult<CameraFrame> {
        self.ensure_open()?;
        if self.spec.fail_capture {
            return Err(BackendError::IoError("sensor readout failed".to_string()));
        }

        let size = size
            .or_else(|| {
                self.spec
                    .characteristics
                    .stream_configuration_map
                    .largest_capture_size(false)
            })
            .ok_or_else(|| BackendError::FormatNotSupported("no capture size".to_string()))?;

        let frame = self.render_pattern(size);
        self.backend.lock().captures += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut state = self.backend.lock();
            state.open_cameras = state.open_cameras.saturating_sub(1);
            debug!(camera_id = %self.spec.device.id, "Synthetic camera closed");
        }
    }
}

impl Drop for SyntheticControl {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_camera() -> SyntheticCameraSpec {
        SyntheticCameraSpec::new("t", "Tiny", LensFacing::Back)
            .with_output_sizes(ImageFormat::Jpeg, &[Size::new(8, 4)])
            .with_exposure(IndexRange::new(-4, 4), Rational::new(1, 2))
    }

    #[test]
    fn test_exposure_round_trip_is_recorded() {
        let backend = SyntheticBackend::with_cameras(vec![tiny_camera()]);
        let device = backend.enumerate_cameras().remove(0);
        let mut control = backend.open(&device).unwrap();

        control.set_exposure_compensation_index(3).unwrap();
        assert_eq!(control.exposure_compensation_index().unwrap(), 3);
        assert_eq!(backend.applied_exposures(), vec![("t".to_string(), 3)]);

        let err = control.set_exposure_compensation_index(9).unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)));
    }

    #[test]
    fn test_capture_renders_requested_size() {
        let backend = SyntheticBackend::with_cameras(vec![tiny_camera()]);
        let device = backend.enumerate_cameras().remove(0);
        let mut control = backend.open(&device).unwrap();

        let frame = control.capture_still(None).unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.data.len(), CameraFrame::expected_len(8, 4));
        assert_eq!(backend.captures(), 1);
    }

    #[test]
    fn test_close_releases_camera() {
        let backend = SyntheticBackend::with_cameras(vec![tiny_camera()]);
        let device = backend.enumerate_cameras().remove(0);
        let mut control = backend.open(&device).unwrap();
        assert_eq!(backend.open_cameras(), 1);

        control.close();
        assert_eq!(backend.open_cameras(), 0);
        assert_eq!(
            control.capture_still(None).unwrap_err(),
            BackendError::CameraClosed
        );

        drop(control);
        assert_eq!(backend.open_cameras(), 0);
    }

    #[test]
    fn test_failures_are_injected() {
        let backend = SyntheticBackend::with_cameras(vec![tiny_camera().failing_open()]);
        let device = backend.enumerate_cameras().remove(0);
        assert!(matches!(
            backend.open(&device),
            Err(BackendError::InitializationFailed(_))
        ));
    }
}
