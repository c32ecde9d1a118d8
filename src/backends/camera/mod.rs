// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! Everything hardware-specific sits behind two traits:
//!
//! ```text
//! ┌─────────────────────┐
//! │   Session Layer     │  ← provider, use cases, binder
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CameraManager     │  ← Thread-safe backend access
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Enumeration, characteristics, open
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌──────┐   ┌───────────┐
//!  │ V4L2 │   │ Synthetic │
//!  └──────┘   └───────────┘
//! ```
//!
//! An opened camera is driven through [`CameraControl`].

pub mod format_converters;
pub mod manager;
pub mod synthetic;
pub mod types;
pub mod v4l2;
pub mod v4l2_controls;

pub use manager::CameraManager;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

/// Camera backend trait
///
/// A backend enumerates cameras, describes them and opens them for control.
/// It never binds anything itself; binding is owned by the session layer.
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is available on the current system
    fn is_available(&self) -> bool;

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Static description of a camera (stream sizes, capabilities, exposure limits)
    fn characteristics(&self, device: &CameraDevice) -> BackendResult<CameraCharacteristics>;

    /// Open a camera for control and capture
    fn open(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraControl>>;

    /// Platform API level, if the platform has one
    ///
    /// Some queries (high-resolution sizes) only exist from a given level on.
    /// `None` means every query is available.
    fn platform_level(&self) -> Option<u32> {
        None
    }
}

/// Control surface of an opened camera
pub trait CameraControl: Send {
    /// Current exposure compensation index
    fn exposure_compensation_index(&self) -> BackendResult<i32>;

    /// Apply an exposure compensation index (already validated against the range)
    fn set_exposure_compensation_index(&mut self, index: i32) -> BackendResult<()>;

    /// Switch to manual exposure with an absolute exposure time
    fn set_exposure_time(&mut self, exposure: Duration) -> BackendResult<()>;

    /// Start focusing and metering on a point
    fn start_focus_and_metering(&mut self, action: &FocusMeteringAction) -> BackendResult<()>;

    /// Return focus and metering to their automatic defaults
    fn cancel_focus_and_metering(&mut self) -> BackendResult<()>;

    /// Grab one still frame at (or near) the requested size
    fn capture_still(&mut self, size: Option<Size>) -> BackendResult<CameraFrame>;

    /// Release the device
    fn close(&mut self) {}
}

/// Get a concrete backend instance for the given type
pub fn get_backend_for_type(backend_type: CameraBackendType) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::V4l2 => Arc::new(v4l2::V4l2Backend::new()),
        CameraBackendType::Synthetic => Arc::new(synthetic::SyntheticBackend::new()),
    }
}
