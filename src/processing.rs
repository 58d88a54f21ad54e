//! Post-processing of decoded frames
//!
//! Pure functions: shape validation, RGB/BGR channel order and clockwise
//! rotation. Nothing in here touches the device.

use crate::config::{ColorMode, Rotation};
use crate::errors::CameraError;
use crate::sdk::{RawDepth, RawImage};
use image::{imageops, ImageBuffer, Luma, RgbImage};

/// Single-channel 16-bit depth map.
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Validate, reorder and rotate a decoded color image.
///
/// The returned buffer is laid out in `color_mode` channel order even though
/// its pixel type is `Rgb<u8>`.
pub fn process_color(
    raw: RawImage,
    color_mode: ColorMode,
    rotation: Rotation,
) -> Result<RgbImage, CameraError> {
    if raw.channels != 3 {
        return Err(CameraError::FrameShapeMismatch(format!(
            "frame channels={} do not match expected 3 channels (RGB/BGR)",
            raw.channels
        )));
    }

    let expected = raw.width as usize * raw.height as usize * 3;
    if raw.data.len() != expected {
        return Err(CameraError::FrameShapeMismatch(format!(
            "{}x{}x3 frame needs {} bytes, got {}",
            raw.width,
            raw.height,
            expected,
            raw.data.len()
        )));
    }

    let (width, height) = (raw.width, raw.height);
    let mut data = raw.data;
    if color_mode == ColorMode::Bgr {
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
    }

    let image = RgbImage::from_raw(width, height, data).ok_or_else(|| {
        CameraError::FrameShapeMismatch(format!("cannot wrap {width}x{height} color buffer"))
    })?;
    Ok(rotate(image, rotation))
}

/// Validate and rotate a rendered depth map.
pub fn process_depth(raw: RawDepth, rotation: Rotation) -> Result<DepthImage, CameraError> {
    let expected = raw.width as usize * raw.height as usize;
    if raw.data.len() != expected {
        return Err(CameraError::FrameShapeMismatch(format!(
            "{}x{} depth map needs {} samples, got {}",
            raw.width,
            raw.height,
            expected,
            raw.data.len()
        )));
    }

    let (width, height) = (raw.width, raw.height);
    let image = DepthImage::from_raw(width, height, raw.data).ok_or_else(|| {
        CameraError::FrameShapeMismatch(format!("cannot wrap {width}x{height} depth buffer"))
    })?;
    Ok(rotate(image, rotation))
}

fn rotate<P>(image: ImageBuffer<P, Vec<P::Subpixel>>, rotation: Rotation) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: image::Pixel + 'static,
{
    match rotation {
        Rotation::None => image,
        Rotation::Rotate90 => imageops::rotate90(&image),
        Rotation::Rotate180 => imageops::rotate180(&image),
        Rotation::Rotate270 => imageops::rotate270(&image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_2x1() -> RawImage {
        RawImage {
            width: 2,
            height: 1,
            channels: 3,
            data: vec![1, 2, 3, 4, 5, 6],
        }
    }

    #[test]
    fn test_rgb_passthrough() {
        let img = process_color(raw_2x1(), ColorMode::Rgb, Rotation::None).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3]);
        assert_eq!(img.get_pixel(1, 0).0, [4, 5, 6]);
    }

    #[test]
    fn test_bgr_swaps_channels() {
        let img = process_color(raw_2x1(), ColorMode::Bgr, Rotation::None).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(img.get_pixel(1, 0).0, [6, 5, 4]);
    }

    #[test]
    fn test_rotate_90_clockwise() {
        let img = process_color(raw_2x1(), ColorMode::Rgb, Rotation::Rotate90).unwrap();
        // Left pixel ends up on top.
        assert_eq!(img.dimensions(), (1, 2));
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3]);
        assert_eq!(img.get_pixel(0, 1).0, [4, 5, 6]);
    }

    #[test]
    fn test_rotate_270() {
        let img = process_color(raw_2x1(), ColorMode::Rgb, Rotation::Rotate270).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
        assert_eq!(img.get_pixel(0, 0).0, [4, 5, 6]);
    }

    #[test]
    fn test_four_channels_rejected() {
        let raw = RawImage {
            width: 1,
            height: 1,
            channels: 4,
            data: vec![0; 4],
        };
        let result = process_color(raw, ColorMode::Rgb, Rotation::None);
        assert!(matches!(result, Err(CameraError::FrameShapeMismatch(_))));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut raw = raw_2x1();
        raw.data.pop();
        assert!(process_color(raw, ColorMode::Rgb, Rotation::None).is_err());
    }

    #[test]
    fn test_depth_rotation() {
        let raw = RawDepth {
            width: 3,
            height: 1,
            data: vec![100, 200, 300],
        };
        let img = process_depth(raw, Rotation::Rotate180).unwrap();
        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(img.get_pixel(0, 0).0, [300]);
        assert_eq!(img.get_pixel(2, 0).0, [100]);
    }

    #[test]
    fn test_depth_shape_mismatch() {
        let raw = RawDepth {
            width: 2,
            height: 2,
            data: vec![0; 3],
        };
        assert!(matches!(
            process_depth(raw, Rotation::None),
            Err(CameraError::FrameShapeMismatch(_))
        ));
    }
}
