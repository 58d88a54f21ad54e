//! Device liveness tracking
//!
//! The SDK reports hot-unplug through a callback fired on its own thread.
//! [`DeviceHealthMonitor`] turns that into a sticky flag the capture path can
//! poll before touching the hardware.

use crate::sdk::OfflineCallback;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DeviceHealthMonitor {
    offline: Arc<AtomicBool>,
}

impl DeviceHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the device has reported going offline.
    ///
    /// Never resets; a reconnect builds a new monitor.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    pub fn mark_offline(&self) {
        if !self.offline.swap(true, Ordering::AcqRel) {
            log::warn!("Device offline event received");
        }
    }

    /// Callback to hand to [`crate::sdk::DeviceSdk::register_offline_callback`].
    pub fn callback(&self) -> OfflineCallback {
        let monitor = self.clone();
        Box::new(move || monitor.mark_offline())
    }
}
