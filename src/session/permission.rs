// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission gate
//!
//! The gate is the only writer of the process-wide "camera permission
//! granted" flag. Observers subscribe to it and bind the camera once it turns
//! `true`.

use crate::constants::REQUEST_CODE_PERMISSIONS;
use crate::errors::PermissionError;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Permissions the camera session depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Camera,
}

impl Permission {
    pub fn name(&self) -> &'static str {
        match self {
            Permission::Camera => "camera",
        }
    }
}

/// Every permission that must be granted before binding
pub const REQUIRED_PERMISSIONS: [Permission; 1] = [Permission::Camera];

/// Platform seam for permission checks and requests
pub trait PermissionChecker: Send + Sync {
    /// Whether the permission is currently granted
    fn check(&self, permission: Permission) -> bool;

    /// Ask the platform to grant permissions
    ///
    /// The answer is delivered to the gate's result handler with the same
    /// request code.
    fn request(&self, permissions: &[Permission], request_code: i32);
}

/// Device node access check
///
/// Camera access is granted when every `videoN` node in the device directory
/// is readable and writable by this process. There is nothing to prompt, so
/// requests only log how to gain access.
#[derive(Debug, Clone)]
pub struct DevicePermissionChecker {
    dev_dir: PathBuf,
}

impl DevicePermissionChecker {
    pub fn new() -> Self {
        Self::with_dev_dir("/dev")
    }

    /// Check nodes in another directory
    pub fn with_dev_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dir.into(),
        }
    }

    fn video_nodes(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.dev_dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .strip_prefix("video")
                    .is_some_and(|n| n.parse::<u32>().is_ok())
            })
            .map(|entry| entry.path())
            .collect()
    }
}

impl Default for DevicePermissionChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn is_read_write_accessible(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

impl PermissionChecker for DevicePermissionChecker {
    fn check(&self, permission: Permission) -> bool {
        match permission {
            Permission::Camera => {
                let nodes = self.video_nodes();
                let denied: Vec<&PathBuf> = nodes
                    .iter()
                    .filter(|node| !is_read_write_accessible(node))
                    .collect();
                if !denied.is_empty() {
                    debug!(?denied, "Video nodes are not accessible");
                }
                denied.is_empty()
            }
        }
    }

    fn request(&self, permissions: &[Permission], request_code: i32) {
        info!(
            request_code,
            permissions = ?permissions,
            "Camera access requires read/write access to video devices (add the user to the 'video' group)"
        );
    }
}

/// Checker with a fixed answer, for tests and the synthetic backend
#[derive(Debug, Default)]
pub struct StaticPermissionChecker {
    granted: AtomicBool,
    grant_on_request: bool,
    requests: Mutex<Vec<i32>>,
}

impl StaticPermissionChecker {
    pub fn granted() -> Self {
        Self {
            granted: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn denied() -> Self {
        Self::default()
    }

    /// Starts denied and grants as soon as permissions are requested
    pub fn granting_on_request() -> Self {
        Self {
            grant_on_request: true,
            ..Self::default()
        }
    }

    /// Simulate the user changing the permission in system settings
    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// Request codes received so far
    pub fn requests(&self) -> Vec<i32> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PermissionChecker for StaticPermissionChecker {
    fn check(&self, _permission: Permission) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request(&self, _permissions: &[Permission], request_code: i32) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request_code);
        if self.grant_on_request {
            self.granted.store(true, Ordering::SeqCst);
        }
    }
}

/// Publishes whether the camera permission is granted
///
/// Starts as `false`. Clones share the published state.
#[derive(Clone)]
pub struct PermissionGate {
    checker: Arc<dyn PermissionChecker>,
    state: Arc<watch::Sender<bool>>,
}

impl PermissionGate {
    pub fn new(checker: Arc<dyn PermissionChecker>) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            checker,
            state: Arc::new(state),
        }
    }

    /// Whether every required permission is granted right now
    pub fn all_permissions_granted(&self) -> bool {
        REQUIRED_PERMISSIONS
            .iter()
            .all(|permission| self.checker.check(*permission))
    }

    /// Publish `true` if the permissions are granted
    ///
    /// Nothing is published on denial; observers keep the last value.
    pub fn check_permissions(&self) -> bool {
        let granted = self.all_permissions_granted();
        if granted {
            self.publish(true);
        }
        granted
    }

    /// Ask the platform for the required permissions
    pub fn request_permissions(&self) {
        debug!(request_code = REQUEST_CODE_PERMISSIONS, "Requesting camera permission");
        self.checker
            .request(&REQUIRED_PERMISSIONS, REQUEST_CODE_PERMISSIONS);
    }

    /// Handle the answer to a permission request
    ///
    /// Answers to other request codes are ignored. A denial is reported once
    /// and never retried.
    pub fn on_request_permissions_result(&self, request_code: i32) -> Result<(), PermissionError> {
        if request_code != REQUEST_CODE_PERMISSIONS {
            debug!(request_code, "Ignoring result for foreign request code");
            return Ok(());
        }

        if self.check_permissions() {
            info!("Camera permission granted");
            Ok(())
        } else {
            warn!("{}", PermissionError::Denied);
            Err(PermissionError::Denied)
        }
    }

    pub fn is_granted(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    fn publish(&self, granted: bool) {
        let previous = self.state.send_replace(granted);
        if previous != granted {
            debug!(granted, "Permission state changed");
        }
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("granted", &self.is_granted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_starts_false() {
        let gate = PermissionGate::new(Arc::new(StaticPermissionChecker::granted()));
        assert!(!gate.is_granted());
        assert!(gate.check_permissions());
        assert!(gate.is_granted());
    }

    #[test]
    fn test_denied_result_reports_error() {
        let checker = Arc::new(StaticPermissionChecker::denied());
        let gate = PermissionGate::new(checker.clone());

        gate.request_permissions();
        assert_eq!(checker.requests(), vec![REQUEST_CODE_PERMISSIONS]);
        assert_eq!(
            gate.on_request_permissions_result(REQUEST_CODE_PERMISSIONS),
            Err(PermissionError::Denied)
        );
        assert!(!gate.is_granted());

        // Results for other requests are not ours
        assert_eq!(gate.on_request_permissions_result(42), Ok(()));
    }

    #[test]
    fn test_grant_after_request_publishes() {
        let gate = PermissionGate::new(Arc::new(StaticPermissionChecker::granting_on_request()));
        let rx = gate.subscribe();
        assert!(!gate.check_permissions());

        gate.request_permissions();
        assert_eq!(gate.on_request_permissions_result(REQUEST_CODE_PERMISSIONS), Ok(()));
        assert!(*rx.borrow());
    }

    #[test]
    fn test_device_checker_reads_node_access() {
        let dir = tempfile::tempdir().unwrap();
        let checker = DevicePermissionChecker::with_dev_dir(dir.path());
        std::fs::write(dir.path().join("video0"), b"").unwrap();
        std::fs::write(dir.path().join("vbi0"), b"").unwrap();

        assert_eq!(checker.video_nodes().len(), 1);
        assert!(checker.check(Permission::Camera));
    }
}
