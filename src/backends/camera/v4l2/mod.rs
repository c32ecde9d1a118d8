// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Cameras are `/dev/videoN` capture nodes. Exposure and focus go through
//! raw control ioctls ([`super::v4l2_controls`]); stills are grabbed from a
//! short mmap stream and decoded to RGB.

mod enumeration;

pub use enumeration::{
    CaptureFormat, StreamDescription, enumerate_v4l2_cameras, image_format_for_fourcc,
    query_stream_configuration,
};

use super::format_converters;
use super::types::*;
use super::v4l2_controls::{
    ControlDevice, ControlInfo, FocusControl, SessionControls, V4L2_CID_AUTO_FOCUS_START,
    V4L2_CID_AUTO_FOCUS_STOP, V4L2_CID_EXPOSURE_AUTO, V4L2_CID_FOCUS_AUTO, V4L2_EXPOSURE_MANUAL,
};
use super::{CameraBackend, CameraControl};
use crate::constants::{CAPTURE_WARMUP_FRAMES, V4L2_BUFFER_COUNT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Pixel formats a still can be decoded from, in order of preference
const DECODABLE_FOURCCS: [&[u8; 4]; 5] = [b"MJPG", b"YUYV", b"UYVY", b"RGB3", b"BGR3"];

/// V4L2 backend
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        std::fs::read_dir("/dev")
            .map(|entries| {
                entries
                    .flatten()
                    .any(|e| e.file_name().to_string_lossy().starts_with("video"))
            })
            .unwrap_or(false)
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        enumerate_v4l2_cameras()
    }

    fn characteristics(&self, device: &CameraDevice) -> BackendResult<CameraCharacteristics> {
        let description = query_stream_configuration(&device.path)?;
        let mut capabilities = description.capabilities;

        let controls = probe_controls(&device.path);
        let exposure_compensation = controls.as_ref().and_then(SessionControls::exposure_compensation);
        let exposure_time_range = controls.as_ref().and_then(SessionControls::exposure_time_range);
        if exposure_time_range.is_some() {
            capabilities.push(Capability::ManualSensor);
        }
        let has_auto_focus = controls
            .as_ref()
            .is_some_and(|c| c.focus != FocusControl::Unsupported);

        Ok(CameraCharacteristics {
            camera_id: device.id.clone(),
            lens_facing: device.lens_facing,
            // Webcams deliver upright frames
            sensor_orientation: SurfaceRotation::Rotation0,
            stream_configuration_map: description.map,
            capabilities,
            exposure_compensation,
            exposure_time_range,
            has_auto_focus,
        })
    }

    fn open(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraControl>> {
        let description = query_stream_configuration(&device.path)?;
        let controls = ControlDevice::open(&device.path)?;
        let session = controls.probe();

        info!(
            path = %device.path,
            formats = description.capture_formats.len(),
            exposure_compensation = session.bias.is_some(),
            focus = ?session.focus,
            "Opened V4L2 camera"
        );

        Ok(Box::new(V4l2CameraControl {
            path: device.path.clone(),
            capture_formats: description.capture_formats,
            controls,
            session,
            open: true,
        }))
    }
}

/// Control summary of a node, `None` when it cannot be opened for ioctls
fn probe_controls(path: &str) -> Option<SessionControls> {
    match ControlDevice::open(path) {
        Ok(device) => Some(device.probe()),
        Err(err) => {
            debug!(path, %err, "Cannot open node for control queries");
            None
        }
    }
}

/// Opened V4L2 camera
///
/// Controls go through the node opened at bind time; the device is only
/// streamed while a still is being captured, so other applications can use
/// it in between.
pub struct V4l2CameraControl {
    path: String,
    capture_formats: Vec<CaptureFormat>,
    controls: ControlDevice,
    session: SessionControls,
    open: bool,
}

impl V4l2CameraControl {
    fn ensure_open(&self) -> BackendResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::CameraClosed)
        }
    }

    fn bias(&self) -> BackendResult<&ControlInfo> {
        self.session
            .bias
            .as_ref()
            .ok_or_else(|| BackendError::ControlNotSupported("exposure compensation".to_string()))
    }

    /// Pick the capture format for a still
    ///
    /// An exact size match wins; otherwise the largest decodable size. Ties go
    /// to the preferred fourcc.
    fn select_format(&self, requested: Option<Size>) -> Option<CaptureFormat> {
        let preference = |fourcc: &[u8; 4]| DECODABLE_FOURCCS.iter().position(|f| *f == fourcc);
        let decodable: Vec<&CaptureFormat> = self
            .capture_formats
            .iter()
            .filter(|f| preference(&f.fourcc).is_some())
            .collect();

        let exact: Vec<&CaptureFormat> = match requested {
            Some(size) => decodable.iter().copied().filter(|f| f.size == size).collect(),
            None => Vec::new(),
        };
        let candidates = if exact.is_empty() { decodable } else { exact };

        candidates
            .into_iter()
            .max_by(|a, b| {
                a.size
                    .area()
                    .cmp(&b.size.area())
                    .then_with(|| preference(&b.fourcc).cmp(&preference(&a.fourcc)))
            })
            .copied()
    }
}

impl CameraControl for V4l2CameraControl {
    fn exposure_compensation_index(&self) -> BackendResult<i32> {
        self.ensure_open()?;
        let bias = self.bias()?;
        let value = self.controls.get(bias.id)?;
        Ok(value / bias.step)
    }

    fn set_exposure_compensation_index(&mut self, index: i32) -> BackendResult<()> {
        self.ensure_open()?;
        let bias = self.bias()?;
        let value = index.saturating_mul(bias.step);
        debug!(path = %self.path, index, value, "Setting exposure bias");
        self.controls.set(bias.id, value)
    }

    fn set_exposure_time(&mut self, exposure: Duration) -> BackendResult<()> {
        self.ensure_open()?;
        let info = self
            .session
            .exposure_absolute
            .as_ref()
            .ok_or_else(|| BackendError::ControlNotSupported("exposure time".to_string()))?;

        // Absolute exposure is inactive until auto exposure is off
        self.controls
            .set(V4L2_CID_EXPOSURE_AUTO, V4L2_EXPOSURE_MANUAL)?;
        let units = info.exposure_time_units(exposure);
        debug!(path = %self.path, units, "Setting absolute exposure");
        self.controls.set(info.id, units)
    }

    fn start_focus_and_metering(&mut self, action: &FocusMeteringAction) -> BackendResult<()> {
        self.ensure_open()?;
        // UVC has no focus regions; the point only matters to drivers with ROI support
        debug!(x = action.point.x, y = action.point.y, "Starting autofocus");
        match self.session.focus {
            FocusControl::Trigger => self.controls.set(V4L2_CID_AUTO_FOCUS_START, 1),
            FocusControl::Continuous => self.controls.set(V4L2_CID_FOCUS_AUTO, 1),
            FocusControl::Unsupported => {
                Err(BackendError::ControlNotSupported("auto focus".to_string()))
            }
        }
    }

    fn cancel_focus_and_metering(&mut self) -> BackendResult<()> {
        self.ensure_open()?;
        match self.session.focus {
            FocusControl::Trigger => self.controls.set(V4L2_CID_AUTO_FOCUS_STOP, 1),
            // Continuous autofocus is already the default state
            FocusControl::Continuous | FocusControl::Unsupported => Ok(()),
        }
    }

    fn capture_still(&mut self, size: Option<Size>) -> BackendResult<CameraFrame> {
        self.ensure_open()?;
        let selected = self.select_format(size).ok_or_else(|| {
            BackendError::FormatNotSupported(format!("no decodable format on {}", self.path))
        })?;

        let dev = Device::with_path(&self.path)
            .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", self.path, e)))?;
        let requested = v4l::Format::new(
            selected.size.width,
            selected.size.height,
            v4l::FourCC::new(&selected.fourcc),
        );
        let format = dev.set_format(&requested).map_err(|e| {
            if e.raw_os_error() == Some(libc::EBUSY) {
                BackendError::Busy(self.path.clone())
            } else {
                BackendError::from(e)
            }
        })?;
        if format.fourcc.repr != selected.fourcc {
            warn!(
                expected = ?selected.fourcc,
                got = ?format.fourcc,
                "Driver changed the pixel format"
            );
        }

        info!(
            path = %self.path,
            width = format.width,
            height = format.height,
            fourcc = ?format.fourcc,
            "Capturing still"
        );

        let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)?;

        // Let auto exposure settle before keeping a frame
        for _ in 0..CAPTURE_WARMUP_FRAMES {
            stream.next()?;
        }
        let captured_at = Instant::now();
        let (buf, meta) = stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = &buf[..if used == 0 { buf.len() } else { used }];

        let rgb = decode_to_rgb(&format.fourcc.repr, data, format.width, format.height)?;
        if rgb.len() != CameraFrame::expected_len(format.width, format.height) {
            return Err(BackendError::Other(format!(
                "short frame: {} bytes for {}x{}",
                rgb.len(),
                format.width,
                format.height
            )));
        }

        Ok(CameraFrame {
            width: format.width,
            height: format.height,
            data: Arc::from(rgb),
            captured_at,
        })
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!(path = %self.path, "Closed V4L2 camera");
        }
    }
}

/// Decode one buffer to packed RGB
fn decode_to_rgb(fourcc: &[u8; 4], data: &[u8], width: u32, height: u32) -> BackendResult<Vec<u8>> {
    match fourcc {
        b"MJPG" | b"JPEG" => {
            let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
                .map_err(|e| BackendError::Other(format!("JPEG decode failed: {}", e)))?;
            Ok(image.to_rgb8().into_raw())
        }
        b"YUYV" => Ok(format_converters::yuyv_to_rgb(data, width, height)),
        b"UYVY" => Ok(format_converters::uyvy_to_rgb(data, width, height)),
        b"RGB3" => Ok(data.to_vec()),
        b"BGR3" => Ok(format_converters::bgr_to_rgb(data)),
        other => Err(BackendError::FormatNotSupported(
            String::from_utf8_lossy(other).to_string(),
        )),
    }
}
