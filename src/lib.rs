//! percipio-camera: asynchronous frame acquisition for Percipio depth cameras
//!
//! The driver opens a device through a [`DeviceSdk`] implementation, reads
//! trigger-mode frames on demand, and keeps a background thread that always
//! holds the newest color frame for low-latency consumers.
//!
//! # Usage
//! ```rust,no_run
//! use percipio_camera::testing::SimulatedSdk;
//! use percipio_camera::{PercipioCamera, PercipioCameraConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), percipio_camera::CameraError> {
//! let sdk = Arc::new(SimulatedSdk::new());
//! let mut camera = PercipioCamera::new(PercipioCameraConfig::default(), sdk)?;
//! camera.connect(true)?;
//! let frame = camera.async_read(200)?;
//! println!("frame {} is {:?}", frame.sequence, frame.image.dimensions());
//! camera.disconnect()?;
//! # Ok(())
//! # }
//! ```
pub mod camera;
pub mod capture_loop;
pub mod config;
pub mod errors;
pub mod frame;
pub mod health;
pub mod processing;
pub mod reader;
pub mod sdk;
pub mod session;
pub mod slot;

// Testing utilities - simulated SDK for offline testing
pub mod testing;

// Re-exports for convenience
pub use camera::PercipioCamera;
pub use capture_loop::{LoopState, LoopStats};
pub use config::{ColorMode, PercipioCameraConfig, Rotation, TimingConfig};
pub use errors::CameraError;
pub use frame::{CapturedImage, ColorFrame, DepthFrame};
pub use health::DeviceHealthMonitor;
pub use processing::DepthImage;
pub use sdk::{DeviceDescriptor, DeviceSdk, SdkError, StreamKind};

/// Initialize logging for the camera driver
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "percipio_camera=info");
    }
    let _ = env_logger::try_init();
}
