use crate::config::{ColorMode, Rotation};
use crate::errors::CameraError;
use crate::frame::{CapturedImage, ColorFrame, DepthFrame};
use crate::processing::{process_color, process_depth};
use crate::sdk::{RawDepth, RawImage, StreamKind};
use crate::session::StreamSession;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Session slot shared by the foreground camera and the capture thread.
///
/// Every hardware call goes through this lock, so a direct read and the
/// capture loop never drive the handle at the same time.
pub type SharedSession = Arc<Mutex<Option<StreamSession>>>;

enum Decoded {
    Color(RawImage),
    Depth(RawDepth),
}

/// One-shot trigger-and-read against the shared session.
#[derive(Clone)]
pub struct FrameReader {
    session: SharedSession,
    color_mode: ColorMode,
    rotation: Rotation,
    hardware_timeout_ms: u32,
    sequence: Arc<AtomicU64>,
    epoch: Instant,
}

impl FrameReader {
    pub fn new(
        session: SharedSession,
        color_mode: ColorMode,
        rotation: Rotation,
        hardware_timeout_ms: u32,
    ) -> Self {
        Self {
            session,
            color_mode,
            rotation,
            hardware_timeout_ms,
            sequence: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
        }
    }

    /// Trigger one capture and return the processed image for `kind`.
    ///
    /// `Ok(None)` is a soft miss: the batch held no frame of that stream.
    /// `timeout_ms` is the caller's budget and is only used for reporting;
    /// the SDK read itself is bounded by the hardware ceiling.
    pub fn capture(
        &self,
        kind: StreamKind,
        color_mode: Option<ColorMode>,
        timeout_ms: u64,
    ) -> Result<Option<CapturedImage>, CameraError> {
        let start = Instant::now();

        let (decoded, sequence, timestamp_us) = {
            let guard = self.session.lock()?;
            let session = guard
                .as_ref()
                .filter(|s| s.is_connected())
                .ok_or(CameraError::NotConnected)?;

            if session.health().is_offline() {
                return Err(CameraError::DeviceOffline);
            }
            if !session.mask().contains(kind.mask()) {
                return Err(match kind {
                    StreamKind::Depth => CameraError::DepthDisabled,
                    StreamKind::Color => CameraError::NotConnected,
                });
            }

            let handle = session.handle()?;
            let sdk = session.sdk();
            sdk.send_trigger(handle)?;
            let frames = sdk.read_frames(handle, self.hardware_timeout_ms)?;

            let Some(frame) = frames.iter().rev().find(|f| f.stream == kind) else {
                log::debug!("No {} frame in batch of {}", kind, frames.len());
                return Ok(None);
            };

            let decoded = match kind {
                StreamKind::Color => Decoded::Color(sdk.decode_color(frame)?),
                StreamKind::Depth => Decoded::Depth(sdk.render_depth(frame)?),
            };

            // Stamped under the session lock so numbering follows hardware order.
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            (decoded, sequence, self.epoch.elapsed().as_micros() as u64)
        };

        let image = match decoded {
            Decoded::Color(raw) => {
                let color_mode = color_mode.unwrap_or(self.color_mode);
                CapturedImage::Color(ColorFrame {
                    sequence,
                    timestamp_us,
                    color_mode,
                    image: process_color(raw, color_mode, self.rotation)?,
                })
            }
            Decoded::Depth(raw) => CapturedImage::Depth(DepthFrame {
                sequence,
                timestamp_us,
                image: process_depth(raw, self.rotation)?,
            }),
        };

        let read_ms = start.elapsed().as_secs_f64() * 1e3;
        log::debug!("{} read took: {:.1}ms", kind, read_ms);
        if read_ms > timeout_ms as f64 {
            log::debug!("{} read exceeded its {} ms budget", kind, timeout_ms);
        }

        Ok(Some(image))
    }

    pub fn capture_color(
        &self,
        color_mode: Option<ColorMode>,
        timeout_ms: u64,
    ) -> Result<Option<ColorFrame>, CameraError> {
        Ok(self
            .capture(StreamKind::Color, color_mode, timeout_ms)?
            .and_then(CapturedImage::into_color))
    }

    pub fn capture_depth(&self, timeout_ms: u64) -> Result<Option<DepthFrame>, CameraError> {
        Ok(self
            .capture(StreamKind::Depth, None, timeout_ms)?
            .and_then(CapturedImage::into_depth))
    }

    /// Number of images produced so far.
    pub fn captured(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
