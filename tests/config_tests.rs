// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camera_session::backends::camera::{CameraBackendType, CameraSelector, ImageFormat, LensFacing};
use camera_session::config::CONFIG_VERSION;
use camera_session::constants::AUTO_FOCUS_INTERVAL;
use camera_session::{AppError, CaptureMode, Config};
use std::path::PathBuf;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.version, CONFIG_VERSION);
    assert_eq!(config.lens_facing, LensFacing::Back);
    assert_eq!(config.capture_mode, CaptureMode::MaximizeQuality);
    assert!(config.auto_focus, "Auto focus should be enabled by default");
    assert_eq!(config.auto_focus_interval(), AUTO_FOCUS_INTERVAL);
    assert!(config.output_directory.is_none());
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        backend: CameraBackendType::Synthetic,
        lens_facing: LensFacing::Front,
        capture_mode: CaptureMode::MinimizeLatency,
        output_directory: Some(PathBuf::from("/tmp/photos")),
        auto_focus: false,
        auto_focus_interval_ms: 500,
        image_format: ImageFormat::Jpeg,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.json"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "backend": "synthetic", "capture_mode": "minimize-latency" }"#)
        .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.backend, CameraBackendType::Synthetic);
    assert_eq!(config.capture_mode, CaptureMode::MinimizeLatency);
    assert_eq!(config.image_format, ImageFormat::Yuv);
    assert!(config.auto_focus);
}

#[test]
fn test_corrupt_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    assert_eq!(Config::load_or_default(&path), Config::default());
}

#[test]
fn test_newer_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, format!(r#"{{ "version": {} }}"#, CONFIG_VERSION + 1)).unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
}

#[test]
fn test_bind_options_follow_config() {
    let config = Config {
        lens_facing: LensFacing::External,
        auto_focus: false,
        ..Config::default()
    };

    let options = config.bind_options(None);
    assert_eq!(options.selector, CameraSelector::Facing(LensFacing::External));
    assert!(!options.auto_focus);
    assert_eq!(options.capture_mode, config.capture_mode);

    let indexed = config.bind_options(Some(2));
    assert_eq!(indexed.selector, CameraSelector::Index(2));
}
