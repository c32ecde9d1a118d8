// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera control interface
//!
//! Raw control ioctls for the settings a camera session drives: exposure
//! compensation (EV bias), absolute exposure time and autofocus.
//! [`ControlDevice::probe`] condenses what a node offers into
//! [`SessionControls`].
//!
//! Inspired by [cameractrls](https://github.com/soyersoyer/cameractrls).

use super::types::{BackendError, BackendResult, ExposureCompensationInfo, IndexRange, Rational};
use crate::constants::EV_BIAS_UNITS_PER_EV;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tracing::{debug, warn};

const V4L2_CID_CAMERA_CLASS_BASE: u32 = 0x009a0900;

pub const V4L2_CID_EXPOSURE_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 1;
/// 100µs units
pub const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 2;
/// Continuous autofocus on/off
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;
/// 0.001 EV units
pub const V4L2_CID_AUTO_EXPOSURE_BIAS: u32 = V4L2_CID_CAMERA_CLASS_BASE + 19;
pub const V4L2_CID_AUTO_FOCUS_START: u32 = V4L2_CID_CAMERA_CLASS_BASE + 28;
pub const V4L2_CID_AUTO_FOCUS_STOP: u32 = V4L2_CID_CAMERA_CLASS_BASE + 29;

/// `V4L2_CID_EXPOSURE_AUTO` value for manual exposure time and iris
pub const V4L2_EXPOSURE_MANUAL: i32 = 1;

const EXPOSURE_ABSOLUTE_UNIT_US: u64 = 100;

const CTRL_TYPE_INTEGER: u32 = 1;
const CTRL_TYPE_BOOLEAN: u32 = 2;
const CTRL_TYPE_BUTTON: u32 = 4;

const CTRL_FLAG_DISABLED: u32 = 0x0001;
const CTRL_FLAG_INACTIVE: u32 = 0x0010;

// _IOWR('V', nr, size)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;

/// `struct v4l2_control`
#[repr(C)]
#[derive(Default)]
struct RawControl {
    id: u32,
    value: i32,
}

/// `struct v4l2_queryctrl`
#[repr(C)]
#[derive(Default)]
struct RawQuery {
    id: u32,
    kind: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Kind of value a control takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Integer,
    Boolean,
    /// Write-only trigger
    Button,
    Other(u32),
}

impl From<u32> for ControlKind {
    fn from(raw: u32) -> Self {
        match raw {
            CTRL_TYPE_INTEGER => ControlKind::Integer,
            CTRL_TYPE_BOOLEAN => ControlKind::Boolean,
            CTRL_TYPE_BUTTON => ControlKind::Button,
            other => ControlKind::Other(other),
        }
    }
}

/// Description of one control as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    pub id: u32,
    pub label: String,
    pub kind: ControlKind,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub flags: u32,
}

impl ControlInfo {
    fn from_raw(raw: &RawQuery) -> Self {
        let label_len = raw.name.iter().position(|&b| b == 0).unwrap_or(raw.name.len());
        Self {
            id: raw.id,
            label: String::from_utf8_lossy(&raw.name[..label_len]).into_owned(),
            kind: raw.kind.into(),
            min: raw.minimum,
            max: raw.maximum,
            step: raw.step,
            flags: raw.flags,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.flags & CTRL_FLAG_DISABLED != 0
    }

    /// Present but ignored in the current mode (e.g. exposure time under auto exposure)
    pub fn is_inactive(&self) -> bool {
        self.flags & CTRL_FLAG_INACTIVE != 0
    }

    /// Exposure compensation limits expressed as an index range
    ///
    /// Only integer controls with a positive step qualify. One index is one
    /// driver step. The EV step is `1 / n` with `n` the number of driver steps
    /// per EV rounded to nearest, so 167 and 333 give 1/6 and 1/3.
    pub fn as_exposure_compensation(&self) -> Option<ExposureCompensationInfo> {
        if self.kind != ControlKind::Integer || self.step <= 0 || self.is_disabled() {
            return None;
        }
        let steps_per_ev = ((EV_BIAS_UNITS_PER_EV + self.step / 2) / self.step).max(1);
        Some(ExposureCompensationInfo {
            range: IndexRange::new(self.min / self.step, self.max / self.step),
            step: Rational::new(1, steps_per_ev),
        })
    }

    /// Settable exposure time range of an absolute exposure control
    pub fn as_exposure_time_range(&self) -> Option<(Duration, Duration)> {
        if self.kind != ControlKind::Integer || self.is_disabled() {
            return None;
        }
        Some((units_to_duration(self.min), units_to_duration(self.max)))
    }

    /// Exposure time in control units, clamped to the control's limits
    pub fn exposure_time_units(&self, exposure: Duration) -> i32 {
        let units = (exposure.as_micros() / EXPOSURE_ABSOLUTE_UNIT_US as u128).min(i32::MAX as u128);
        (units as i32).clamp(self.min, self.max.max(self.min))
    }
}

fn units_to_duration(units: i32) -> Duration {
    Duration::from_micros(units.max(0) as u64 * EXPOSURE_ABSOLUTE_UNIT_US)
}

/// How a node starts autofocus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusControl {
    /// One-shot trigger with a matching stop
    Trigger,
    /// Continuous autofocus switch only
    Continuous,
    Unsupported,
}

/// Controls a camera session can drive on one node
#[derive(Debug, Clone)]
pub struct SessionControls {
    pub bias: Option<ControlInfo>,
    pub exposure_absolute: Option<ControlInfo>,
    pub focus: FocusControl,
}

impl SessionControls {
    pub fn exposure_compensation(&self) -> Option<ExposureCompensationInfo> {
        self.bias.as_ref().and_then(ControlInfo::as_exposure_compensation)
    }

    pub fn exposure_time_range(&self) -> Option<(Duration, Duration)> {
        self.exposure_absolute
            .as_ref()
            .and_then(ControlInfo::as_exposure_time_range)
    }
}

/// An open video node used for control ioctls
#[derive(Debug)]
pub struct ControlDevice {
    path: String,
    file: File,
}

impl ControlDevice {
    pub fn open(path: &str) -> BackendResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            path: path.to_string(),
            file,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Driver description of a control, `None` if the node lacks it
    pub fn query(&self, control_id: u32) -> Option<ControlInfo> {
        let mut raw = RawQuery {
            id: control_id,
            ..RawQuery::default()
        };
        self.ioctl(VIDIOC_QUERYCTRL, &mut raw).ok()?;
        Some(ControlInfo::from_raw(&raw))
    }

    /// Whether the control exists and is not disabled
    pub fn supports(&self, control_id: u32) -> bool {
        self.query(control_id).is_some_and(|info| !info.is_disabled())
    }

    pub fn get(&self, control_id: u32) -> BackendResult<i32> {
        let mut raw = RawControl {
            id: control_id,
            value: 0,
        };
        self.ioctl(VIDIOC_G_CTRL, &mut raw).map_err(|errno| {
            debug!(path = %self.path, control_id, %errno, "Reading control failed");
            control_error(control_id, errno)
        })?;
        Ok(raw.value)
    }

    pub fn set(&self, control_id: u32, value: i32) -> BackendResult<()> {
        let mut raw = RawControl {
            id: control_id,
            value,
        };
        self.ioctl(VIDIOC_S_CTRL, &mut raw).map_err(|errno| {
            warn!(path = %self.path, control_id, value, %errno, "Writing control failed");
            control_error(control_id, errno)
        })?;
        if raw.value != value {
            debug!(path = %self.path, control_id, requested = value, applied = raw.value, "Driver adjusted control value");
        }
        Ok(())
    }

    /// Everything a camera session uses, in one pass
    pub fn probe(&self) -> SessionControls {
        let focus = if self.supports(V4L2_CID_AUTO_FOCUS_START) {
            FocusControl::Trigger
        } else if self.supports(V4L2_CID_FOCUS_AUTO) {
            FocusControl::Continuous
        } else {
            FocusControl::Unsupported
        };
        SessionControls {
            bias: self
                .query(V4L2_CID_AUTO_EXPOSURE_BIAS)
                .filter(|info| info.as_exposure_compensation().is_some()),
            exposure_absolute: self
                .query(V4L2_CID_EXPOSURE_ABSOLUTE)
                .filter(|info| !info.is_disabled()),
            focus,
        }
    }

    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> std::io::Result<()> {
        // SAFETY: `arg` is a #[repr(C)] struct matching the request's kernel ABI
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T) };
        if result < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn control_error(control_id: u32, errno: std::io::Error) -> BackendError {
    match errno.raw_os_error() {
        Some(libc::EINVAL) => BackendError::ControlNotSupported(format!("0x{:08x}", control_id)),
        Some(libc::ERANGE) => BackendError::InvalidArgument(format!(
            "value out of range for control 0x{:08x}",
            control_id
        )),
        Some(libc::EBUSY) => BackendError::Busy(format!("control 0x{:08x}", control_id)),
        _ => BackendError::IoError(errno.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{ExposureLevel, compute_index};
    use crate::backends::camera::types::ExposureState;

    fn integer(min: i32, max: i32, step: i32) -> ControlInfo {
        ControlInfo {
            id: V4L2_CID_AUTO_EXPOSURE_BIAS,
            label: "Auto Exposure, Bias".to_string(),
            kind: ControlKind::Integer,
            min,
            max,
            step,
            flags: 0,
        }
    }

    #[test]
    fn test_camera_class_ids() {
        assert_eq!(V4L2_CID_EXPOSURE_AUTO, 0x009a0901);
        assert_eq!(V4L2_CID_EXPOSURE_ABSOLUTE, 0x009a0902);
        assert_eq!(V4L2_CID_FOCUS_AUTO, 0x009a090c);
        assert_eq!(V4L2_CID_AUTO_EXPOSURE_BIAS, 0x009a0913);
        assert_eq!(V4L2_CID_AUTO_FOCUS_START, 0x009a091c);
        assert_eq!(V4L2_CID_AUTO_FOCUS_STOP, 0x009a091d);
    }

    #[test]
    fn test_control_kind() {
        assert_eq!(ControlKind::from(1), ControlKind::Integer);
        assert_eq!(ControlKind::from(4), ControlKind::Button);
        assert_eq!(ControlKind::from(9), ControlKind::Other(9));
    }

    #[test]
    fn test_query_label_stops_at_nul() {
        let mut raw = RawQuery {
            id: V4L2_CID_FOCUS_AUTO,
            kind: CTRL_TYPE_BOOLEAN,
            maximum: 1,
            ..RawQuery::default()
        };
        raw.name[..10].copy_from_slice(b"Focus Auto");
        let info = ControlInfo::from_raw(&raw);
        assert_eq!(info.label, "Focus Auto");
        assert_eq!(info.kind, ControlKind::Boolean);
    }

    #[test]
    fn test_bias_as_exposure_compensation() {
        // ±2 EV in 1/6 EV steps, as reported by UVC drivers
        let info = integer(-2004, 2004, 167).as_exposure_compensation().unwrap();
        assert_eq!(info.range, IndexRange::new(-12, 12));
        assert_eq!(info.step, Rational::new(1, 6));
        assert_eq!(
            integer(-2000, 2000, 333).as_exposure_compensation().unwrap().step,
            Rational::new(1, 3)
        );
        assert_eq!(
            integer(-4000, 4000, 2000).as_exposure_compensation().unwrap().step,
            Rational::new(1, 1)
        );

        let mut menu = integer(-4, 4, 1);
        menu.kind = ControlKind::Other(9);
        assert!(menu.as_exposure_compensation().is_none());
        assert!(integer(0, 0, 0).as_exposure_compensation().is_none());

        let mut disabled = integer(-4, 4, 1);
        disabled.flags = CTRL_FLAG_DISABLED;
        assert!(disabled.as_exposure_compensation().is_none());
    }

    #[test]
    fn test_bias_steps_move_one_index_and_one_ev() {
        let info = integer(-2004, 2004, 167).as_exposure_compensation().unwrap();
        let state = ExposureState {
            index: 0,
            range: info.range,
            step: info.step,
            supported: true,
        };
        assert_eq!(compute_index(ExposureLevel::StepUp, &state), Some(1));
        assert_eq!(compute_index(ExposureLevel::StepDown, &state), Some(-1));
        assert_eq!(compute_index(ExposureLevel::WholeStopUp, &state), Some(6));
        assert_eq!(compute_index(ExposureLevel::WholeStopDown, &state), Some(-6));
    }

    #[test]
    fn test_exposure_time_units() {
        let info = integer(1, 5000, 1);
        assert_eq!(info.exposure_time_units(Duration::from_millis(10)), 100);
        assert_eq!(info.exposure_time_units(Duration::from_secs(10)), 5000);
        assert_eq!(info.exposure_time_units(Duration::ZERO), 1);
        assert_eq!(
            info.as_exposure_time_range(),
            Some((Duration::from_micros(100), Duration::from_millis(500)))
        );
    }

    #[test]
    fn test_session_controls_summary() {
        let controls = SessionControls {
            bias: Some(integer(-6, 6, 1)),
            exposure_absolute: None,
            focus: FocusControl::Unsupported,
        };
        assert_eq!(controls.exposure_compensation().unwrap().range, IndexRange::new(-6, 6));
        assert!(controls.exposure_time_range().is_none());
    }
}
