use crate::config::ColorMode;
use crate::processing::DepthImage;
use crate::sdk::StreamKind;
use image::RgbImage;

/// Processed color capture.
#[derive(Debug, Clone)]
pub struct ColorFrame {
    /// Monotonic per-camera capture counter, starting at 1
    pub sequence: u64,
    /// Microseconds since the camera object was created
    pub timestamp_us: u64,
    /// Channel order of `image`
    pub color_mode: ColorMode,
    pub image: RgbImage,
}

/// Processed depth capture.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub image: DepthImage,
}

#[derive(Debug, Clone)]
pub enum CapturedImage {
    Color(ColorFrame),
    Depth(DepthFrame),
}

impl CapturedImage {
    pub fn kind(&self) -> StreamKind {
        match self {
            CapturedImage::Color(_) => StreamKind::Color,
            CapturedImage::Depth(_) => StreamKind::Depth,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            CapturedImage::Color(f) => f.sequence,
            CapturedImage::Depth(f) => f.sequence,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            CapturedImage::Color(f) => f.image.dimensions(),
            CapturedImage::Depth(f) => f.image.dimensions(),
        }
    }

    pub fn into_color(self) -> Option<ColorFrame> {
        match self {
            CapturedImage::Color(f) => Some(f),
            CapturedImage::Depth(_) => None,
        }
    }

    pub fn into_depth(self) -> Option<DepthFrame> {
        match self {
            CapturedImage::Depth(f) => Some(f),
            CapturedImage::Color(_) => None,
        }
    }
}
