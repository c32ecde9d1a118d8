// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device discovery and stream configuration queries

use crate::backends::camera::types::*;
use crate::constants::HIGH_RESOLUTION_MAX_FPS;
use std::path::Path;
use tracing::{debug, info};
use v4l::framesize::FrameSizeEnum;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::prelude::*;
use v4l::video::Capture;

/// Sizes probed inside stepwise frame size ranges
const STEPWISE_CANDIDATES: [(u32, u32); 6] = [
    (3840, 2160),
    (2592, 1944),
    (1920, 1080),
    (1280, 720),
    (640, 480),
    (320, 240),
];

/// One capturable (pixel format, size) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub fourcc: [u8; 4],
    pub size: Size,
    /// Best frame rate the driver reports, None when unknown
    pub max_fps: Option<u32>,
}

/// Everything the stream configuration query learns about a device
#[derive(Debug, Clone, Default)]
pub struct StreamDescription {
    pub map: StreamConfigurationMap,
    pub capabilities: Vec<Capability>,
    pub capture_formats: Vec<CaptureFormat>,
}

/// Map a V4L2 fourcc to the image format family it belongs to
pub fn image_format_for_fourcc(fourcc: &[u8; 4]) -> Option<ImageFormat> {
    match fourcc {
        b"YUYV" | b"UYVY" | b"YVYU" | b"VYUY" | b"NV12" | b"NV21" | b"NV16" | b"YU12"
        | b"YV12" | b"422P" => Some(ImageFormat::Yuv),
        b"MJPG" | b"JPEG" => Some(ImageFormat::Jpeg),
        b"RGB3" | b"BGR3" => Some(ImageFormat::Rgb),
        b"BA81" | b"GBRG" | b"GRBG" | b"RGGB" | b"BG10" | b"GB10" | b"BA10" | b"RG10"
        | b"pBAA" | b"pGAA" | b"pgAA" | b"pRAA" | b"BG12" | b"GB12" | b"BA12" | b"RG12" => {
            Some(ImageFormat::RawSensor)
        }
        _ => None,
    }
}

/// Numeric suffix of a `/dev/videoN` node, used for ordering
fn video_index(name: &str) -> Option<u32> {
    name.strip_prefix("video")?.parse().ok()
}

/// Scan `/dev` for video capture nodes
///
/// Metadata and output nodes are skipped, as are capture nodes that list no
/// pixel formats (secondary nodes of multi-node drivers).
pub fn enumerate_v4l2_cameras() -> Vec<CameraDevice> {
    let mut nodes: Vec<(u32, String)> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            video_index(&name).map(|index| (index, name))
        })
        .collect();
    nodes.sort();

    let mut cameras = Vec::new();
    for (_, name) in nodes {
        let path = format!("/dev/{}", name);
        let Ok(dev) = Device::with_path(&path) else {
            debug!(path, "Cannot open video node");
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            debug!(path, card = %caps.card, "Skipping non-capture node");
            continue;
        }
        if dev.enum_formats().map(|f| f.is_empty()).unwrap_or(true) {
            debug!(path, card = %caps.card, "Skipping node without pixel formats");
            continue;
        }

        info!(path, card = %caps.card, driver = %caps.driver, "Found V4L2 camera");
        cameras.push(CameraDevice {
            id: name,
            name: caps.card.clone(),
            path,
            lens_facing: LensFacing::External,
            driver: Some(caps.driver.clone()),
        });
    }

    cameras
}

/// Best frame rate among a size's frame intervals
fn max_fps(dev: &Device, fourcc: v4l::FourCC, size: Size) -> Option<u32> {
    let intervals = dev
        .enum_frameintervals(fourcc, size.width, size.height)
        .ok()?;
    intervals
        .iter()
        .filter_map(|interval| {
            let fraction = match &interval.interval {
                FrameIntervalEnum::Discrete(fraction) => fraction,
                FrameIntervalEnum::Stepwise(stepwise) => &stepwise.min,
            };
            (fraction.numerator > 0).then(|| fraction.denominator / fraction.numerator)
        })
        .max()
}

/// Sizes a device offers for one fourcc
fn frame_sizes(dev: &Device, fourcc: v4l::FourCC) -> Vec<Size> {
    let Ok(frame_sizes) = dev.enum_framesizes(fourcc) else {
        return Vec::new();
    };

    let mut sizes = Vec::new();
    for frame_size in frame_sizes {
        match frame_size.size {
            FrameSizeEnum::Discrete(discrete) => {
                sizes.push(Size::new(discrete.width, discrete.height));
            }
            FrameSizeEnum::Stepwise(step) => {
                let in_range = |w: u32, h: u32| {
                    (step.min_width..=step.max_width).contains(&w)
                        && (step.min_height..=step.max_height).contains(&h)
                };
                sizes.extend(
                    STEPWISE_CANDIDATES
                        .iter()
                        .filter(|(w, h)| in_range(*w, *h))
                        .map(|(w, h)| Size::new(*w, *h)),
                );
                sizes.push(Size::new(step.max_width, step.max_height));
            }
        }
    }
    sizes.sort();
    sizes.dedup();
    sizes
}

/// Build the stream configuration of a device
///
/// Sizes whose best frame rate is below the burst threshold are recorded as
/// high-resolution sizes; everything else is a regular output size.
pub fn query_stream_configuration(path: &str) -> BackendResult<StreamDescription> {
    if !Path::new(path).exists() {
        return Err(BackendError::DeviceNotFound(path.to_string()));
    }
    let dev = Device::with_path(path)
        .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", path, e)))?;
    let descriptions = dev.enum_formats()?;

    let mut description = StreamDescription {
        capabilities: vec![Capability::BackwardCompatible],
        ..StreamDescription::default()
    };

    for desc in descriptions {
        let Some(format) = image_format_for_fourcc(&desc.fourcc.repr) else {
            debug!(path, fourcc = ?desc.fourcc, "Ignoring unsupported pixel format");
            continue;
        };

        for size in frame_sizes(&dev, desc.fourcc) {
            let fps = max_fps(&dev, desc.fourcc, size);
            let high_resolution = fps.is_some_and(|fps| fps < HIGH_RESOLUTION_MAX_FPS);

            if high_resolution {
                description
                    .map
                    .add_high_resolution_output_size(format, size);
            } else {
                description.map.add_output_size(format, size);
            }
            description.capture_formats.push(CaptureFormat {
                fourcc: desc.fourcc.repr,
                size,
                max_fps: fps,
            });
        }

        if format == ImageFormat::RawSensor && !description.capabilities.contains(&Capability::Raw)
        {
            description.capabilities.push(Capability::Raw);
        }
    }

    debug!(
        path,
        formats = description.capture_formats.len(),
        "Queried V4L2 stream configuration"
    );
    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_families() {
        assert_eq!(image_format_for_fourcc(b"YUYV"), Some(ImageFormat::Yuv));
        assert_eq!(image_format_for_fourcc(b"NV12"), Some(ImageFormat::Yuv));
        assert_eq!(image_format_for_fourcc(b"MJPG"), Some(ImageFormat::Jpeg));
        assert_eq!(image_format_for_fourcc(b"BGR3"), Some(ImageFormat::Rgb));
        assert_eq!(image_format_for_fourcc(b"RGGB"), Some(ImageFormat::RawSensor));
        assert_eq!(image_format_for_fourcc(b"Y10B"), None);
    }

    #[test]
    fn test_video_node_ordering() {
        assert_eq!(video_index("video10"), Some(10));
        assert_eq!(video_index("video2"), Some(2));
        assert_eq!(video_index("video-loopback"), None);
        assert_eq!(video_index("vbi0"), None);
    }

    #[test]
    fn test_missing_node_is_not_found() {
        assert!(matches!(
            query_stream_configuration("/dev/video-does-not-exist"),
            Err(BackendError::DeviceNotFound(_))
        ));
    }
}
