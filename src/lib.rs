// SPDX-License-Identifier: GPL-3.0-only

//! Camera Session - lifecycle-gated camera sessions over pluggable backends
//!
//! This library binds preview and still-capture use cases to a lifecycle
//! owner, steps exposure compensation, captures timestamped JPEG photos and
//! reports the stream sizes a camera supports.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture screen controller, exposure control and diagnostics
//! - [`session`]: Permission gate, lifecycle, provider and session binder
//! - [`backends`]: Camera backend abstraction (V4L2 and synthetic)
//! - [`pipelines`]: Photo capture pipeline
//! - [`config`]: User configuration handling
//! - [`storage`]: Photo paths and output directories
//!
//! # Example
//!
//! ```ignore
//! let manager = CameraManager::new(get_backend_for_type(CameraBackendType::Synthetic));
//! let binder = CameraSessionBinder::new(manager, Arc::new(ManualOrientationSource::default()));
//! let setup = binder
//!     .bind(preview_target, &owner, None, BindOptions::default(), |_| {})
//!     .wait()
//!     .await?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use app::{CaptureController, ExposureController, ExposureLevel, MainViewModel};
pub use backends::camera::{CameraBackendType, CameraManager, CameraSelector};
pub use config::Config;
pub use constants::CaptureMode;
pub use errors::{AppError, AppResult};
pub use session::{CameraSessionBinder, CameraSetup, LifecycleOwner, PermissionGate};
