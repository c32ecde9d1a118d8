// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera session

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Permission errors
    Permission(PermissionError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera session errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Use case binding failed
    BindingFailed(String),
    /// Binding did not resolve in time
    BindTimeout,
    /// The capture executor no longer accepts work
    ExecutorShutdown,
    /// Backend error
    Backend(BackendError),
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoError {
    /// The capture use case is not bound or its lifecycle is not started
    CameraClosed,
    /// The capture executor was shut down before the request was queued
    ExecutorShutdown,
    /// Capture failed
    CaptureFailed(String),
    /// Encoding failed
    EncodingFailed(String),
    /// Save failed
    SaveFailed(String),
}

/// Permission errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The user did not grant the requested permissions
    Denied,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Permission(e) => write!(f, "Permission error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::BindingFailed(msg) => write!(f, "Use case binding failed: {}", msg),
            CameraError::BindTimeout => write!(f, "Camera binding timed out"),
            CameraError::ExecutorShutdown => write!(f, "Camera executor is shut down"),
            CameraError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::CameraClosed => write!(f, "Camera is closed"),
            PhotoError::ExecutorShutdown => write!(f, "Capture executor is shut down"),
            PhotoError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionError::Denied => write!(f, "Permissions not granted by the user."),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for PhotoError {}
impl std::error::Error for PermissionError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<PermissionError> for AppError {
    fn from(err: PermissionError) -> Self {
        AppError::Permission(err)
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(_) => CameraError::NoCameraFound,
            other => CameraError::Backend(other),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err.into())
    }
}

impl From<BackendError> for PhotoError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::CameraClosed => PhotoError::CameraClosed,
            other => PhotoError::CaptureFailed(other.to_string()),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_map_to_photo_errors() {
        assert_eq!(
            PhotoError::from(BackendError::CameraClosed),
            PhotoError::CameraClosed
        );
        assert!(matches!(
            PhotoError::from(BackendError::IoError("boom".into())),
            PhotoError::CaptureFailed(_)
        ));
    }

    #[test]
    fn test_missing_device_is_no_camera() {
        let err: CameraError = BackendError::DeviceNotFound("none".into()).into();
        assert!(matches!(err, CameraError::NoCameraFound));
    }

    #[test]
    fn test_permission_denied_message() {
        assert_eq!(
            PermissionError::Denied.to_string(),
            "Permissions not granted by the user."
        );
    }
}
