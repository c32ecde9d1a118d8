// SPDX-License-Identifier: GPL-3.0-only

//! Camera session layer
//!
//! Lifecycle-gated binding of use cases to cameras:
//!
//! - [`PermissionGate`]: camera permission state, published through `watch`
//! - [`LifecycleOwner`]: host lifecycle the session follows
//! - [`ProcessCameraProvider`]: the single bound use-case set
//! - [`CameraSessionBinder`]: asynchronous rebinding of preview and capture
//! - [`CameraExecutor`]: worker thread for capture jobs

mod binder;
mod camera;
mod executor;
mod lifecycle;
mod orientation;
mod permission;
mod provider;
mod setup;
mod use_cases;

pub use binder::{BindOptions, CameraSessionBinder, PendingBind};
pub use camera::Camera;
pub use executor::CameraExecutor;
pub use lifecycle::{LifecycleEvent, LifecycleOwner, LifecycleState};
pub use orientation::{
    ManualOrientationSource, ORIENTATION_UNKNOWN, OrientationEventListener, OrientationSource,
    rotation_for_orientation,
};
pub use permission::{
    DevicePermissionChecker, Permission, PermissionChecker, PermissionGate, REQUIRED_PERMISSIONS,
    StaticPermissionChecker,
};
pub use provider::ProcessCameraProvider;
pub use setup::CameraSetup;
pub use use_cases::{
    ImageCapture, ImageCaptureBuilder, OnImageSavedCallback, OutputFileOptions,
    OutputFileResults, Preview, PreviewTarget, SurfaceProvider, SurfaceRequest, UseCase,
};
