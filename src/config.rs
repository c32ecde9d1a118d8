// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraBackendType, CameraSelector, ImageFormat, LensFacing};
use crate::constants::{APP_NAME, AUTO_FOCUS_INTERVAL, CaptureMode};
use crate::errors::{AppError, AppResult};
use crate::session::BindOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Current on-disk config version
pub const CONFIG_VERSION: u32 = 1;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    /// Camera backend to use (V4L2 or synthetic)
    pub backend: CameraBackendType,
    /// Preferred lens facing when no camera index is given
    pub lens_facing: LensFacing,
    pub capture_mode: CaptureMode,
    /// Photo directory override (default: pictures dir / app name)
    pub output_directory: Option<PathBuf>,
    /// Start a centered focus action after every bind
    pub auto_focus: bool,
    pub auto_focus_interval_ms: u64,
    /// Format used for resolution reports
    pub image_format: ImageFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: CameraBackendType::default(),
            lens_facing: LensFacing::Back,
            capture_mode: CaptureMode::default(),
            output_directory: None,
            auto_focus: true,
            auto_focus_interval_ms: AUTO_FOCUS_INTERVAL.as_millis() as u64,
            image_format: ImageFormat::Yuv,
        }
    }
}

impl Config {
    /// `<config dir>/<app name>/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                warn!("No config directory, using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing or unreadable file yields defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        if config.version > CONFIG_VERSION {
            return Err(AppError::Config(format!(
                "config version {} is newer than supported version {}",
                config.version, CONFIG_VERSION
            )));
        }
        Ok(Config {
            version: CONFIG_VERSION,
            ..config
        })
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no config directory".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn auto_focus_interval(&self) -> Duration {
        Duration::from_millis(self.auto_focus_interval_ms)
    }

    /// Bind options for these settings; a camera index overrides the facing
    pub fn bind_options(&self, camera_index: Option<usize>) -> BindOptions {
        BindOptions {
            capture_mode: self.capture_mode,
            selector: camera_index
                .map(CameraSelector::Index)
                .unwrap_or(CameraSelector::Facing(self.lens_facing)),
            auto_focus: self.auto_focus,
            auto_focus_interval: self.auto_focus_interval(),
            image_format: self.image_format,
        }
    }
}
