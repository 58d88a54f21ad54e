//! Percipio camera driver
//!
//! [`PercipioCamera`] ties the pieces together: it validates configuration up
//! front, owns the stream session, and serves the latest color frame from a
//! lazily started capture thread.

use crate::capture_loop::{CaptureLoop, LoopSettings, LoopState, LoopStats};
use crate::config::{ColorMode, PercipioCameraConfig};
use crate::errors::CameraError;
use crate::frame::{ColorFrame, DepthFrame};
use crate::health::DeviceHealthMonitor;
use crate::reader::{FrameReader, SharedSession};
use crate::sdk::{DeviceDescriptor, DeviceSdk, StreamFormat};
use crate::session::StreamSession;
use crate::slot::FrameSlot;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const WARMUP_READ_INTERVAL: Duration = Duration::from_millis(100);

pub struct PercipioCamera {
    config: PercipioCameraConfig,
    sdk: Arc<dyn DeviceSdk>,
    session: SharedSession,
    health: Option<DeviceHealthMonitor>,
    reader: FrameReader,
    slot: Arc<FrameSlot<ColorFrame>>,
    capture_loop: CaptureLoop,
}

impl PercipioCamera {
    /// Create a camera; the configuration is validated before any SDK call.
    pub fn new(config: PercipioCameraConfig, sdk: Arc<dyn DeviceSdk>) -> Result<Self, CameraError> {
        config.validate()?;

        let session: SharedSession = Arc::new(Mutex::new(None));
        let reader = FrameReader::new(
            session.clone(),
            config.color_mode,
            config.rotation,
            config.timing.hardware_timeout_ms,
        );
        let label = match &config.serial_number {
            Some(serial) => format!("percipio_{serial}"),
            None => "percipio".to_string(),
        };
        let capture_loop = CaptureLoop::new(
            label,
            LoopSettings {
                read_timeout_ms: config.timing.loop_read_timeout_ms,
                error_backoff: Duration::from_millis(config.timing.error_backoff_ms),
                restart_grace: Duration::from_millis(config.timing.restart_grace_ms),
            },
        );

        Ok(Self {
            config,
            sdk,
            session,
            health: None,
            reader,
            slot: Arc::new(FrameSlot::new()),
            capture_loop,
        })
    }

    /// Enumerate attached devices without opening any of them.
    pub fn find_cameras(sdk: &dyn DeviceSdk) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let devices = sdk.list_devices()?;
        if devices.is_empty() {
            log::info!("No Percipio device found");
        }
        for (idx, dev) in devices.iter().enumerate() {
            log::debug!("{} -- {}\t{}", idx, dev.id, dev.interface_id);
        }
        Ok(devices)
    }

    pub fn config(&self) -> &PercipioCameraConfig {
        &self.config
    }

    /// True iff a session with a live handle and running stream exists.
    pub fn is_connected(&self) -> bool {
        self.health.is_some()
    }

    pub fn device(&self) -> Option<DeviceDescriptor> {
        self.with_session(|s| s.device().clone())
    }

    pub fn stream_format(&self) -> Option<StreamFormat> {
        self.with_session(|s| s.format().clone())
    }

    pub fn is_offline(&self) -> bool {
        self.health.as_ref().is_some_and(DeviceHealthMonitor::is_offline)
    }

    /// Open the device and start streaming.
    ///
    /// With `warmup`, frames are read and discarded for `warmup_s` seconds so
    /// auto-exposure can settle. Any failure leaves the camera disconnected.
    pub fn connect(&mut self, warmup: bool) -> Result<(), CameraError> {
        if self.is_connected() {
            return Err(CameraError::AlreadyConnected);
        }

        let session = StreamSession::connect(self.sdk.clone(), &self.config)?;
        let health = session.health().clone();
        *self.session.lock()? = Some(session);
        self.health = Some(health);
        self.slot = Arc::new(FrameSlot::new());

        if warmup {
            if let Err(e) = self.warmup() {
                log::warn!("{} warmup failed: {}", self, e);
                if let Err(teardown) = self.disconnect() {
                    log::warn!("{} teardown after failed warmup: {}", self, teardown);
                }
                return Err(e);
            }
        }

        log::info!("{} connected.", self);
        Ok(())
    }

    fn warmup(&self) -> Result<(), CameraError> {
        let deadline = Instant::now()
            .checked_add(Duration::from_secs(self.config.warmup_s))
            .ok_or_else(|| {
                CameraError::InvalidConfig(format!("warmup_s {} is out of range", self.config.warmup_s))
            })?;
        let mut discarded = 0u32;
        while Instant::now() < deadline {
            match self
                .reader
                .capture_color(None, self.config.timing.loop_read_timeout_ms)
            {
                Ok(Some(_)) => discarded += 1,
                Ok(None) => {}
                Err(e @ (CameraError::NotConnected | CameraError::DeviceOffline)) => return Err(e),
                Err(e) => log::debug!("{} warmup read failed: {}", self, e),
            }
            std::thread::sleep(WARMUP_READ_INTERVAL);
        }
        log::debug!("{} discarded {} warmup frames", self, discarded);
        Ok(())
    }

    /// Stop the capture thread, then stop the stream and close the device.
    ///
    /// No frame is published after this returns.
    pub fn disconnect(&mut self) -> Result<(), CameraError> {
        if !self.is_connected() && !self.capture_loop.has_worker() {
            return Err(CameraError::NotConnected);
        }

        self.slot.close()?;
        if let Err(e) = self
            .capture_loop
            .stop(Duration::from_millis(self.config.timing.stop_timeout_ms))
        {
            log::warn!("{}: {}", self, e);
        }

        self.health = None;
        let session = self.session.lock()?.take();
        if let Some(mut session) = session {
            session.disconnect()?;
        }

        log::info!("{} disconnected.", self);
        Ok(())
    }

    /// Synchronously capture one color frame.
    ///
    /// `Ok(None)` when the device returned a batch without a color frame.
    pub fn read(
        &self,
        color_mode: Option<ColorMode>,
        timeout_ms: u64,
    ) -> Result<Option<ColorFrame>, CameraError> {
        if !self.is_connected() {
            return Err(CameraError::NotConnected);
        }
        self.reader.capture_color(color_mode, timeout_ms)
    }

    /// Synchronously capture one depth map.
    pub fn read_depth(&self, timeout_ms: u64) -> Result<Option<DepthFrame>, CameraError> {
        if !self.is_connected() {
            return Err(CameraError::NotConnected);
        }
        if !self.config.use_depth {
            return Err(CameraError::DepthDisabled);
        }
        self.reader.capture_depth(timeout_ms)
    }

    /// Return the next color frame produced by the capture thread.
    ///
    /// Starts the thread on first use. Waits up to `timeout_ms` for a frame
    /// that no earlier call has returned.
    pub fn async_read(&mut self, timeout_ms: u64) -> Result<ColorFrame, CameraError> {
        if !self.is_connected() {
            return Err(CameraError::NotConnected);
        }
        if self.is_offline() {
            return Err(CameraError::DeviceOffline);
        }

        self.capture_loop.ensure_running(&self.reader, &self.slot)?;

        match self.slot.take_fresh(Duration::from_millis(timeout_ms))? {
            Some(frame) => Ok(frame),
            // The device may have dropped off while we were waiting.
            None if self.is_offline() => Err(CameraError::DeviceOffline),
            None => Err(CameraError::Timeout {
                timeout_ms,
                thread_alive: self.capture_loop.is_alive(),
            }),
        }
    }

    pub fn capture_state(&self) -> LoopState {
        self.capture_loop.state()
    }

    pub fn capture_stats(&self) -> LoopStats {
        self.capture_loop.stats()
    }

    fn with_session<T>(&self, f: impl FnOnce(&StreamSession) -> T) -> Option<T> {
        self.session.lock().ok()?.as_ref().map(f)
    }
}

impl fmt::Display for PercipioCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config.serial_number {
            Some(serial) => write!(f, "PercipioCamera({serial})"),
            None => write!(f, "PercipioCamera(registration={})", self.config.registration_mode),
        }
    }
}

impl Drop for PercipioCamera {
    fn drop(&mut self) {
        if self.is_connected() || self.capture_loop.has_worker() {
            if let Err(e) = self.disconnect() {
                log::warn!("Error disconnecting {} in drop: {}", self, e);
            }
        }
    }
}
