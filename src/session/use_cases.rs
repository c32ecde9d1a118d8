// SPDX-License-Identifier: GPL-3.0-only

//! Camera use cases
//!
//! A use case is one way of using a bound camera: [`Preview`] streams into a
//! surface supplied by the UI, [`ImageCapture`] takes stills to files. Use
//! cases are created unbound and attached by the camera provider.

use super::camera::Camera;
use super::executor::CameraExecutor;
use crate::backends::camera::{Size, SurfaceRotation};
use crate::constants::CaptureMode;
use crate::errors::PhotoError;
use crate::pipelines::photo::{PhotoPipeline, jpeg_rotation};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===== Preview =====

/// A surface handed to the preview target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub surface_id: u64,
    pub camera_id: String,
    pub resolution: Size,
}

/// Receiver of preview surfaces (the rendering target)
pub trait SurfaceProvider: Send + Sync {
    /// A new surface is live at the given resolution
    fn on_surface_requested(&self, request: SurfaceRequest);

    /// A surface is no longer fed by the camera
    fn on_surface_released(&self, surface_id: u64);
}

/// Preview target that tracks its live surfaces
#[derive(Debug, Default)]
pub struct PreviewTarget {
    name: String,
    live: Mutex<Vec<SurfaceRequest>>,
    requested: AtomicU64,
}

impl PreviewTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn live_surfaces(&self) -> Vec<SurfaceRequest> {
        lock(&self.live).clone()
    }

    pub fn live_surface_count(&self) -> usize {
        lock(&self.live).len()
    }

    /// Surfaces requested over the target's lifetime
    pub fn total_requests(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }
}

impl SurfaceProvider for PreviewTarget {
    fn on_surface_requested(&self, request: SurfaceRequest) {
        info!(
            preview = %self.name,
            surface_id = request.surface_id,
            camera_id = %request.camera_id,
            resolution = %request.resolution,
            "Preview surface live"
        );
        self.requested.fetch_add(1, Ordering::SeqCst);
        lock(&self.live).push(request);
    }

    fn on_surface_released(&self, surface_id: u64) {
        debug!(preview = %self.name, surface_id, "Preview surface released");
        lock(&self.live).retain(|surface| surface.surface_id != surface_id);
    }
}

struct PreviewInner {
    surface_provider: Mutex<Option<Arc<dyn SurfaceProvider>>>,
    active_surface: Mutex<Option<u64>>,
}

/// Preview use case
#[derive(Clone)]
pub struct Preview {
    inner: Arc<PreviewInner>,
}

impl Preview {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PreviewInner {
                surface_provider: Mutex::new(None),
                active_surface: Mutex::new(None),
            }),
        }
    }

    pub fn set_surface_provider(&self, provider: Arc<dyn SurfaceProvider>) {
        *lock(&self.inner.surface_provider) = Some(provider);
    }

    /// Surface currently fed by the camera
    pub fn active_surface(&self) -> Option<u64> {
        *lock(&self.inner.active_surface)
    }

    pub fn ptr_eq(&self, other: &Preview) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn attach(&self, camera_id: &str, resolution: Size) {
        let provider = lock(&self.inner.surface_provider).clone();
        let Some(provider) = provider else {
            debug!(camera_id, "Preview bound without a surface provider");
            return;
        };

        let surface_id = NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed);
        provider.on_surface_requested(SurfaceRequest {
            surface_id,
            camera_id: camera_id.to_string(),
            resolution,
        });
        *lock(&self.inner.active_surface) = Some(surface_id);
    }

    pub(crate) fn detach(&self) {
        let Some(surface_id) = lock(&self.inner.active_surface).take() else {
            return;
        };
        if let Some(provider) = lock(&self.inner.surface_provider).clone() {
            provider.on_surface_released(surface_id);
        }
    }
}

impl Default for Preview {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("active_surface", &self.active_surface())
            .finish()
    }
}

// ===== Image capture =====

/// Where a captured image is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileOptions {
    path: PathBuf,
}

impl OutputFileOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome of a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileResults {
    pub saved_path: PathBuf,
}

/// Completion callback of [`ImageCapture::take_picture`]
///
/// Invoked exactly once, on the capture executor thread.
pub trait OnImageSavedCallback: Send + 'static {
    fn on_image_saved(self: Box<Self>, output: OutputFileResults);
    fn on_error(self: Box<Self>, error: PhotoError);
}

impl<F> OnImageSavedCallback for F
where
    F: FnOnce(Result<OutputFileResults, PhotoError>) + Send + 'static,
{
    fn on_image_saved(self: Box<Self>, output: OutputFileResults) {
        (*self)(Ok(output))
    }

    fn on_error(self: Box<Self>, error: PhotoError) {
        (*self)(Err(error))
    }
}

#[derive(Clone)]
struct BoundCapture {
    camera: Camera,
    capture_size: Option<Size>,
}

struct ImageCaptureInner {
    capture_mode: CaptureMode,
    target_rotation: Mutex<SurfaceRotation>,
    bound: Mutex<Option<BoundCapture>>,
}

/// Builder for [`ImageCapture`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCaptureBuilder {
    capture_mode: CaptureMode,
    target_rotation: SurfaceRotation,
}

impl ImageCaptureBuilder {
    pub fn capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = mode;
        self
    }

    pub fn target_rotation(mut self, rotation: SurfaceRotation) -> Self {
        self.target_rotation = rotation;
        self
    }

    pub fn build(self) -> ImageCapture {
        ImageCapture {
            inner: Arc::new(ImageCaptureInner {
                capture_mode: self.capture_mode,
                target_rotation: Mutex::new(self.target_rotation),
                bound: Mutex::new(None),
            }),
        }
    }
}

/// Still capture use case
#[derive(Clone)]
pub struct ImageCapture {
    inner: Arc<ImageCaptureInner>,
}

impl ImageCapture {
    pub fn builder() -> ImageCaptureBuilder {
        ImageCaptureBuilder::default()
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.inner.capture_mode
    }

    pub fn target_rotation(&self) -> SurfaceRotation {
        *lock(&self.inner.target_rotation)
    }

    /// Rotation applied to the next captured image
    pub fn set_target_rotation(&self, rotation: SurfaceRotation) {
        *lock(&self.inner.target_rotation) = rotation;
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.inner.bound).is_some()
    }

    /// Camera this use case is bound to
    pub fn camera(&self) -> Option<Camera> {
        lock(&self.inner.bound).as_ref().map(|b| b.camera.clone())
    }

    /// Size stills are captured at while bound
    pub fn capture_size(&self) -> Option<Size> {
        lock(&self.inner.bound).as_ref().and_then(|b| b.capture_size)
    }

    pub fn ptr_eq(&self, other: &ImageCapture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn attach(&self, camera: Camera) {
        let capture_size = camera
            .characteristics()
            .stream_configuration_map
            .largest_capture_size(self.inner.capture_mode.allows_high_resolution());
        debug!(camera_id = %camera.camera_id(), ?capture_size, "Image capture bound");
        *lock(&self.inner.bound) = Some(BoundCapture {
            camera,
            capture_size,
        });
    }

    pub(crate) fn detach(&self) {
        lock(&self.inner.bound).take();
    }

    /// Capture a still to a file
    ///
    /// Returns immediately. The capture runs on `executor` and `callback` is
    /// told the outcome there. An unbound use case, or one whose lifecycle is
    /// not started, fails with [`PhotoError::CameraClosed`].
    pub fn take_picture<C>(&self, options: OutputFileOptions, executor: &CameraExecutor, callback: C)
    where
        C: OnImageSavedCallback,
    {
        let callback = Box::new(callback);
        if executor.is_shutdown() {
            callback.on_error(PhotoError::ExecutorShutdown);
            return;
        }

        let capture = self.clone();
        let job = move || match capture.capture_to_file(&options) {
            Ok(output) => callback.on_image_saved(output),
            Err(err) => callback.on_error(err),
        };
        if let Err(err) = executor.execute(job) {
            error!(%err, "Capture request dropped");
        }
    }

    fn capture_to_file(&self, options: &OutputFileOptions) -> Result<OutputFileResults, PhotoError> {
        let bound = lock(&self.inner.bound).clone();
        let Some(bound) = bound else {
            return Err(PhotoError::CameraClosed);
        };
        if !bound.camera.is_active() {
            return Err(PhotoError::CameraClosed);
        }

        let frame = bound.camera.capture_still(bound.capture_size)?;
        let characteristics = bound.camera.characteristics();
        let rotation = jpeg_rotation(
            characteristics.sensor_orientation,
            self.target_rotation(),
            characteristics.lens_facing,
        );

        let saved_path = PhotoPipeline::new(self.inner.capture_mode).process(
            &frame,
            rotation,
            options.path(),
        )?;
        Ok(OutputFileResults { saved_path })
    }
}

impl std::fmt::Debug for ImageCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCapture")
            .field("capture_mode", &self.capture_mode())
            .field("target_rotation", &self.target_rotation())
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Any bindable use case
#[derive(Debug, Clone)]
pub enum UseCase {
    Preview(Preview),
    ImageCapture(ImageCapture),
}

impl UseCase {
    pub fn name(&self) -> &'static str {
        match self {
            UseCase::Preview(_) => "preview",
            UseCase::ImageCapture(_) => "image-capture",
        }
    }

    /// Same use case instance
    pub fn ptr_eq(&self, other: &UseCase) -> bool {
        match (self, other) {
            (UseCase::Preview(a), UseCase::Preview(b)) => a.ptr_eq(b),
            (UseCase::ImageCapture(a), UseCase::ImageCapture(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Preview> for UseCase {
    fn from(preview: Preview) -> Self {
        UseCase::Preview(preview)
    }
}

impl From<ImageCapture> for UseCase {
    fn from(capture: ImageCapture) -> Self {
        UseCase::ImageCapture(capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_preview_surface_handshake() {
        let target = Arc::new(PreviewTarget::new("test"));
        let preview = Preview::new();
        preview.set_surface_provider(target.clone());

        preview.attach("0", Size::new(640, 480));
        assert_eq!(target.live_surface_count(), 1);
        assert_eq!(target.live_surfaces()[0].resolution, Size::new(640, 480));

        preview.detach();
        assert_eq!(target.live_surface_count(), 0);
        assert_eq!(target.total_requests(), 1);
        assert!(preview.active_surface().is_none());
    }

    #[test]
    fn test_unbound_capture_reports_camera_closed() {
        let executor = CameraExecutor::new().unwrap();
        let capture = ImageCapture::builder().build();
        let (tx, rx) = mpsc::channel();

        capture.take_picture(
            OutputFileOptions::new("/tmp/never-written.jpg"),
            &executor,
            move |result: Result<OutputFileResults, PhotoError>| {
                let _ = tx.send(result);
            },
        );
        assert_eq!(rx.recv().unwrap(), Err(PhotoError::CameraClosed));
    }

    #[test]
    fn test_shutdown_executor_reports_error() {
        let executor = CameraExecutor::new().unwrap();
        executor.shutdown();
        let (tx, rx) = mpsc::channel();

        ImageCapture::builder().build().take_picture(
            OutputFileOptions::new("/tmp/never-written.jpg"),
            &executor,
            move |result: Result<OutputFileResults, PhotoError>| {
                let _ = tx.send(result);
            },
        );
        assert_eq!(rx.recv().unwrap(), Err(PhotoError::ExecutorShutdown));
    }

    #[test]
    fn test_use_case_identity() {
        let a = UseCase::from(Preview::new());
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&UseCase::from(Preview::new())));
        assert_eq!(UseCase::from(ImageCapture::builder().build()).name(), "image-capture");
    }
}
