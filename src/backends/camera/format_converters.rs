// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for V4L2 still frames
//!
//! Drivers hand out packed YUV 4:2:2 or BGR buffers; stills are encoded from
//! packed RGB, so everything is converted to RGB8 here.

/// BT.601 YUV to RGB for one pixel
#[inline]
fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    [
        (y + 1.402 * v).clamp(0.0, 255.0) as u8,
        (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8,
        (y + 1.772 * u).clamp(0.0, 255.0) as u8,
    ]
}

/// Byte offsets of Y0, U, Y1, V inside a 4-byte macropixel
struct PackedLayout {
    y0: usize,
    u: usize,
    y1: usize,
    v: usize,
}

const YUYV: PackedLayout = PackedLayout { y0: 0, u: 1, y1: 2, v: 3 };
const UYVY: PackedLayout = PackedLayout { u: 0, y0: 1, v: 2, y1: 3 };

fn packed_422_to_rgb(data: &[u8], width: u32, height: u32, layout: &PackedLayout) -> Vec<u8> {
    let pixel_count = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    // Each 4-byte group encodes 2 pixels sharing one chroma sample
    for chunk in data.chunks_exact(4) {
        let u = chunk[layout.u] as f32 - 128.0;
        let v = chunk[layout.v] as f32 - 128.0;

        for y in [chunk[layout.y0], chunk[layout.y1]] {
            if rgb.len() >= pixel_count * 3 {
                break;
            }
            rgb.extend_from_slice(&yuv_to_rgb(y as f32, u, v));
        }
    }

    rgb
}

/// Convert YUYV (Y0 U0 Y1 V0) to RGB
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    packed_422_to_rgb(data, width, height, &YUYV)
}

/// Convert UYVY (U0 Y0 V0 Y1) to RGB
pub fn uyvy_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    packed_422_to_rgb(data, width, height, &UYVY)
}

/// Swap the channel order of packed BGR
pub fn bgr_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb() {
        // Neutral chroma gives grey
        let data = [128, 128, 64, 128];
        let rgb = yuyv_to_rgb(&data, 2, 1);
        assert_eq!(rgb, vec![128, 128, 128, 64, 64, 64]);
    }

    #[test]
    fn test_uyvy_to_rgb() {
        let data = [128, 200, 128, 100];
        let rgb = uyvy_to_rgb(&data, 2, 1);
        assert_eq!(rgb.len(), 6);
        assert_eq!(&rgb[..3], &[200, 200, 200]);
        assert_eq!(&rgb[3..], &[100, 100, 100]);
    }

    #[test]
    fn test_truncated_buffer_stops_at_pixel_count() {
        let data = [128u8; 16];
        assert_eq!(yuyv_to_rgb(&data, 2, 1).len(), 6);
    }

    #[test]
    fn test_bgr_to_rgb() {
        assert_eq!(bgr_to_rgb(&[1, 2, 3, 4, 5, 6]), vec![3, 2, 1, 6, 5, 4]);
    }
}
