//! Synthetic frame content
//!
//! Deterministic patterns shaped like what a Percipio FM851 returns, so
//! processing and capture can be tested without hardware.

use crate::sdk::{DeviceDescriptor, RawFrame, StreamFormat, StreamKind};

/// Color frame with a gradient that shifts with `frame_number`.
///
/// Samples are interleaved RGB with `channels` values per pixel; channels
/// beyond the third are filled with 255.
pub fn synthetic_color_frame(frame_number: u64, width: u32, height: u32, channels: u8) -> RawFrame {
    let channels = channels as usize;
    let mut data = vec![0u8; width as usize * height as usize * channels];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = (y as usize * width as usize + x as usize) * channels;
            let px = &mut data[idx..idx + channels];
            if let Some(r) = px.get_mut(0) {
                *r = base.wrapping_add((x % 256) as u8);
            }
            if let Some(g) = px.get_mut(1) {
                *g = base.wrapping_add((y % 256) as u8);
            }
            if let Some(b) = px.get_mut(2) {
                *b = base.wrapping_add(((x + y) % 256) as u8);
            }
            for extra in px.iter_mut().skip(3) {
                *extra = 255;
            }
        }
    }

    RawFrame {
        stream: StreamKind::Color,
        width,
        height,
        data,
    }
}

/// Depth frame: a tilted plane in millimetres, little-endian `u16` samples.
pub fn synthetic_depth_frame(frame_number: u64, width: u32, height: u32) -> RawFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 2);
    let offset = (frame_number % 100) as u16;
    for y in 0..height {
        for x in 0..width {
            let mm = 500u16
                .wrapping_add((x % 1000) as u16)
                .wrapping_add((y % 1000) as u16)
                .wrapping_add(offset);
            data.extend_from_slice(&mm.to_le_bytes());
        }
    }

    RawFrame {
        stream: StreamKind::Depth,
        width,
        height,
        data,
    }
}

/// Descriptor as reported by a network-attached FM851.
pub fn synthetic_descriptor(serial: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        id: serial.to_string(),
        interface_id: format!("eth-{serial}"),
        vendor_name: "Percipio".to_string(),
        model_name: "FM851-E2".to_string(),
        hardware_version: "1.1.0".to_string(),
        firmware_version: "3.13.7".to_string(),
    }
}

/// Color formats offered by the simulated device, smallest first.
pub fn synthetic_color_formats() -> Vec<StreamFormat> {
    vec![
        StreamFormat {
            width: 320,
            height: 240,
            description: "yuyv 320x240".to_string(),
        },
        StreamFormat {
            width: 640,
            height: 480,
            description: "yuyv 640x480".to_string(),
        },
        StreamFormat {
            width: 1280,
            height: 960,
            description: "bayer 1280x960".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_color_frame_correct_size() {
        let frame = synthetic_color_frame(0, 64, 48, 3);
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.data.len(), 64 * 48 * 3);
    }

    #[test]
    fn test_four_channel_frame_pads_alpha() {
        let frame = synthetic_color_frame(0, 2, 1, 4);
        assert_eq!(frame.data.len(), 8);
        assert_eq!(frame.data[3], 255);
        assert_eq!(frame.data[7], 255);
    }

    #[test]
    fn test_synthetic_frames_differ() {
        let frame0 = synthetic_color_frame(0, 32, 24, 3);
        let frame1 = synthetic_color_frame(1, 32, 24, 3);
        assert_ne!(frame0.data[0], frame1.data[0]);
    }

    #[test]
    fn test_depth_frame_layout() {
        let frame = synthetic_depth_frame(0, 4, 2);
        assert_eq!(frame.data.len(), 4 * 2 * 2);
        assert_eq!(u16::from_le_bytes([frame.data[0], frame.data[1]]), 500);
    }
}
