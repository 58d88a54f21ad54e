//! Device SDK boundary
//!
//! The vendor camera library is reached only through [`DeviceSdk`]. Everything
//! above this module (session, reader, capture loop) is written against the
//! trait so it can run on real hardware bindings or on
//! [`crate::testing::SimulatedSdk`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error reported by the vendor SDK, carrying its numeric status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sdk error {code}: {description}")]
pub struct SdkError {
    pub code: i32,
    pub description: String,
}

impl SdkError {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

/// Opaque handle to an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// Enumeration entry for one attached camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub interface_id: String,
    pub vendor_name: String,
    pub model_name: String,
    pub hardware_version: String,
    pub firmware_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Color,
    Depth,
}

impl StreamKind {
    pub fn mask(self) -> StreamMask {
        match self {
            StreamKind::Color => StreamMask::COLOR,
            StreamKind::Depth => StreamMask::DEPTH,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Color => write!(f, "color"),
            StreamKind::Depth => write!(f, "depth"),
        }
    }
}

/// Bit set of enabled streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamMask(u32);

impl StreamMask {
    pub const COLOR: StreamMask = StreamMask(0b01);
    pub const DEPTH: StreamMask = StreamMask(0b10);

    pub const fn empty() -> Self {
        StreamMask(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: StreamMask) -> Self {
        StreamMask(self.0 | other.0)
    }

    pub const fn contains(self, other: StreamMask) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl std::ops::BitOr for StreamMask {
    type Output = StreamMask;

    fn bitor(self, rhs: StreamMask) -> StreamMask {
        self.union(rhs)
    }
}

/// One resolution/pixel-layout entry reported for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TriggerMode {
    /// Free-running streaming.
    Off,
    /// One frame per software trigger.
    #[default]
    Slave,
}

/// Raw capture unit as returned by `read_frames`.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub stream: StreamKind,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Decoded color image, interleaved 8-bit samples in RGB order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

/// Rendered depth map, one 16-bit sample per pixel (millimetres).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDepth {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
}

/// Invoked by the SDK from its own thread when the device drops off the bus.
pub type OfflineCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Vendor camera library.
///
/// Implementations must be callable from the capture thread; the crate
/// never issues two calls on the same handle concurrently.
pub trait DeviceSdk: Send + Sync {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, SdkError>;

    fn open(&self, serial: &str) -> Result<DeviceHandle, SdkError>;

    fn register_offline_callback(
        &self,
        handle: DeviceHandle,
        callback: OfflineCallback,
    ) -> Result<(), SdkError>;

    fn stream_formats(
        &self,
        handle: DeviceHandle,
        stream: StreamKind,
    ) -> Result<Vec<StreamFormat>, SdkError>;

    fn configure_stream(
        &self,
        handle: DeviceHandle,
        stream: StreamKind,
        format: &StreamFormat,
    ) -> Result<(), SdkError>;

    fn set_trigger_mode(&self, handle: DeviceHandle, mode: TriggerMode) -> Result<(), SdkError>;

    fn load_default_parameters(&self, handle: DeviceHandle) -> Result<(), SdkError>;

    fn enable_streams(&self, handle: DeviceHandle, mask: StreamMask) -> Result<(), SdkError>;

    fn stream_on(&self, handle: DeviceHandle) -> Result<(), SdkError>;

    fn stream_off(&self, handle: DeviceHandle) -> Result<(), SdkError>;

    fn close(&self, handle: DeviceHandle) -> Result<(), SdkError>;

    fn send_trigger(&self, handle: DeviceHandle) -> Result<(), SdkError>;

    /// Blocks until a frame batch arrives or `timeout_ms` elapses.
    fn read_frames(&self, handle: DeviceHandle, timeout_ms: u32) -> Result<Vec<RawFrame>, SdkError>;

    fn decode_color(&self, frame: &RawFrame) -> Result<RawImage, SdkError>;

    fn render_depth(&self, frame: &RawFrame) -> Result<RawDepth, SdkError>;
}
