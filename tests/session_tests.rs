// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for session binding and the capture screen

use camera_session::app::{CaptureController, ExposureLevel, MainViewModel, ResolutionInspector};
use camera_session::backends::camera::synthetic::{SyntheticBackend, SyntheticCameraSpec};
use camera_session::backends::camera::{
    BackendError, CameraManager, CameraSelector, ImageFormat, IndexRange, LensFacing, Rational,
    Size,
};
use camera_session::constants::REQUEST_CODE_PERMISSIONS;
use camera_session::errors::{AppError, CameraError, PhotoError};
use camera_session::pipelines::photo::CaptureCoordinator;
use camera_session::session::{
    BindOptions, CameraExecutor, CameraSessionBinder, CameraSetup, ImageCapture, LifecycleOwner,
    LifecycleState, ManualOrientationSource, PermissionGate, PreviewTarget,
    StaticPermissionChecker,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn small_camera() -> SyntheticCameraSpec {
    SyntheticCameraSpec::new("0", "Small Back Camera", LensFacing::Back)
        .with_output_sizes(ImageFormat::Yuv, &[Size::new(64, 48), Size::new(32, 24)])
        .with_output_sizes(ImageFormat::Jpeg, &[Size::new(64, 48)])
        .with_exposure(IndexRange::new(-6, 6), Rational::new(1, 3))
}

fn binder_for(backend: &SyntheticBackend) -> CameraSessionBinder {
    CameraSessionBinder::new(
        CameraManager::new(Arc::new(backend.clone())),
        Arc::new(ManualOrientationSource::default()),
    )
}

fn quiet_options() -> BindOptions {
    BindOptions {
        auto_focus: false,
        ..BindOptions::default()
    }
}

fn controller(
    backend: &SyntheticBackend,
    checker: Arc<StaticPermissionChecker>,
    dir: &std::path::Path,
) -> CaptureController {
    CaptureController::new(
        MainViewModel::new(PermissionGate::new(checker)),
        binder_for(backend),
        quiet_options(),
        Some(dir.to_path_buf()),
    )
    .expect("controller should start")
}

/// Drive a controller through create, view creation, start and resume
fn open_screen(controller: &CaptureController) {
    controller.on_create();
    controller.on_view_created();
    controller.on_start();
    controller.on_resume().expect("resume should succeed");
}

#[tokio::test]
async fn test_exposure_requests_stay_in_range() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.expect("camera should bind");

    let sequence = [
        ExposureLevel::WholeStopUp,
        ExposureLevel::WholeStopUp,
        ExposureLevel::WholeStopUp,
        ExposureLevel::StepUp,
        ExposureLevel::Max,
        ExposureLevel::StepUp,
        ExposureLevel::Min,
        ExposureLevel::StepDown,
        ExposureLevel::WholeStopDown,
        ExposureLevel::Neutral,
    ];
    for level in sequence {
        let index = screen.apply_exposure(level).expect("exposure is supported");
        assert!((-6..=6).contains(&index), "{:?} gave {}", level, index);
        let applied = backend.exposure_index("0").unwrap();
        assert!((-6..=6).contains(&applied));
    }
    assert_eq!(backend.exposure_index("0"), Some(-6));
}

#[tokio::test]
async fn test_exposure_unsupported_is_a_no_op() {
    let spec = small_camera().without_exposure();
    let backend = SyntheticBackend::with_cameras(vec![spec]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();

    assert_eq!(screen.apply_exposure(ExposureLevel::Max), None);
    assert!(backend.applied_exposures().is_empty());
    assert!(!screen.exposure_info().unwrap().supported);
}

#[tokio::test]
async fn test_exposure_time_is_clamped_to_advertised_range() {
    // Default back camera exposes 100µs..1s
    let backend = SyntheticBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();

    screen.set_exact_exposure_time(Duration::from_secs(5)).unwrap();
    assert_eq!(backend.exposure_time("0"), Some(Duration::from_secs(1)));

    screen.set_exact_exposure_time(Duration::from_micros(10)).unwrap();
    assert_eq!(backend.exposure_time("0"), Some(Duration::from_micros(100)));

    screen.set_exact_exposure_time(Duration::from_millis(20)).unwrap();
    assert_eq!(backend.exposure_time("0"), Some(Duration::from_millis(20)));
}

#[tokio::test]
async fn test_exposure_time_without_manual_control_is_rejected() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());

    assert!(matches!(
        screen.set_exact_exposure_time(Duration::from_millis(10)),
        Err(AppError::Camera(CameraError::Backend(BackendError::CameraClosed)))
    ));

    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();
    assert!(matches!(
        screen.set_exact_exposure_time(Duration::from_millis(10)),
        Err(AppError::Camera(CameraError::Backend(BackendError::ControlNotSupported(_))))
    ));
    assert_eq!(backend.exposure_time("0"), None);
}

#[tokio::test]
async fn test_rebind_leaves_one_use_case_set() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let binder = binder_for(&backend);
    let target = Arc::new(PreviewTarget::new("viewfinder"));
    let owner = LifecycleOwner::new();
    owner.move_to(LifecycleState::Resumed);

    let first = binder
        .bind(target.clone(), &owner, None, quiet_options(), |_| {})
        .wait()
        .await
        .unwrap();
    let second = binder
        .bind(target.clone(), &owner, None, quiet_options(), |_| {})
        .wait()
        .await
        .unwrap();

    let provider = binder.provider().await.unwrap();
    assert_eq!(provider.bound_use_cases().len(), 2);
    assert_eq!(target.live_surface_count(), 1);
    assert_eq!(backend.open_cameras(), 1);
    assert!(!first.is_bound());
    assert!(second.is_bound());
    assert!(!first.image_capture.unwrap().is_bound());
}

#[tokio::test]
async fn test_capture_against_unbound_use_case_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let executor = CameraExecutor::new().unwrap();
    let coordinator = CaptureCoordinator::new(dir.path());

    assert!(coordinator.take_photo(&CameraSetup::empty(), &executor).is_none());

    let setup = CameraSetup::with_image_capture(ImageCapture::builder().build());
    let ticket = coordinator.take_photo(&setup, &executor).unwrap();
    assert_eq!(ticket.wait().await, Err(PhotoError::CameraClosed));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_denied_permission_never_binds_until_granted() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let checker = Arc::new(StaticPermissionChecker::denied());
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, checker.clone(), dir.path());
    open_screen(&screen);

    assert_eq!(checker.requests(), vec![REQUEST_CODE_PERMISSIONS]);
    assert!(screen.on_request_permissions_result(REQUEST_CODE_PERMISSIONS).is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!screen.view_model().camera_setup().is_bound());
    assert_eq!(backend.open_cameras(), 0);

    checker.set_granted(true);
    screen
        .on_request_permissions_result(REQUEST_CODE_PERMISSIONS)
        .expect("permission now granted");
    let setup = screen.wait_for_setup(WAIT).await.expect("grant should bind");
    assert!(setup.is_bound());
    assert_eq!(backend.open_cameras(), 1);
}

#[tokio::test]
async fn test_photo_is_written_with_timestamped_name() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();

    let ticket = screen.take_photo().expect("capture use case is bound");
    let path = ticket.wait().await.expect("capture should succeed");

    assert_eq!(path.parent(), Some(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(name.len(), "yyyy-MM-dd-HH-mm-ss-SSS.jpg".len());
    assert!(name.ends_with(".jpg"));

    let image = image::open(&path).expect("photo should decode");
    assert_eq!((image.width(), image.height()), (64, 48));
    assert_eq!(backend.captures(), 1);
}

#[tokio::test]
async fn test_stopped_screen_rejects_captures_until_resumed() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();

    screen.on_pause();
    screen.on_stop();
    assert!(screen.executor().is_shutdown());
    let ticket = screen.take_photo().unwrap();
    assert_eq!(ticket.wait().await, Err(PhotoError::ExecutorShutdown));

    screen.on_start();
    screen.on_resume().unwrap();
    assert!(!screen.executor().is_shutdown());
    let path = screen.take_photo().unwrap().wait().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_destroyed_screen_releases_camera() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();
    assert_eq!(backend.open_cameras(), 1);

    screen.on_pause();
    screen.on_stop();
    screen.on_destroy();
    for _ in 0..100 {
        if backend.open_cameras() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(backend.open_cameras(), 0);
}

#[tokio::test]
async fn test_destroy_finishes_queued_captures() {
    let backend = SyntheticBackend::with_cameras(vec![small_camera()]);
    let dir = tempfile::tempdir().unwrap();
    let screen = controller(&backend, Arc::new(StaticPermissionChecker::granted()), dir.path());
    open_screen(&screen);
    screen.wait_for_setup(WAIT).await.unwrap();

    let tickets: Vec<_> = (0..3).map(|_| screen.take_photo().unwrap()).collect();
    screen.on_destroy();
    assert!(screen.executor().is_shutdown());
    assert_eq!(backend.captures(), 3);

    for ticket in tickets {
        assert!(ticket.wait().await.unwrap().exists());
    }
}

#[tokio::test]
async fn test_resolution_inspector_reports_advertised_sizes() {
    let spec = SyntheticCameraSpec::new("0", "Two Sizes", LensFacing::Back)
        .with_output_sizes(ImageFormat::Yuv, &[Size::new(1280, 720), Size::new(640, 480)])
        .with_high_resolution_sizes(ImageFormat::Yuv, &[Size::new(4000, 3000)]);
    let backend = SyntheticBackend::with_cameras(vec![spec]);
    let binder = binder_for(&backend);
    let owner = LifecycleOwner::new();

    let setup = binder
        .bind(
            Arc::new(PreviewTarget::new("viewfinder")),
            &owner,
            None,
            quiet_options(),
            |_| {},
        )
        .wait()
        .await
        .unwrap();
    let camera = setup.camera.unwrap();

    let report = ResolutionInspector::default().inspect(&camera, Some(23));
    assert_eq!(
        report.all_output_sizes(),
        vec![Size::new(1280, 720), Size::new(640, 480), Size::new(4000, 3000)]
    );

    let legacy = ResolutionInspector::default().inspect(&camera, Some(22));
    assert_eq!(legacy.all_output_sizes(), vec![Size::new(1280, 720), Size::new(640, 480)]);
}

#[tokio::test]
async fn test_front_selector_binds_front_camera() {
    let backend = SyntheticBackend::new();
    let binder = binder_for(&backend);
    let options = BindOptions {
        selector: CameraSelector::DEFAULT_FRONT_CAMERA,
        ..quiet_options()
    };

    let setup = binder
        .bind(
            Arc::new(PreviewTarget::new("viewfinder")),
            &LifecycleOwner::new(),
            None,
            options,
            |_| {},
        )
        .wait()
        .await
        .unwrap();
    assert_eq!(setup.camera.unwrap().device().lens_facing, LensFacing::Front);
}
