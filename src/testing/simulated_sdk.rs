//! In-process stand-in for the Percipio SDK
//!
//! Behaves like a trigger-mode camera: every `send_trigger` makes the next
//! `read_frames` return one batch after `frame_interval`. Failure knobs let
//! tests script open/enable errors, transient read errors, malformed frames
//! and hot-unplug.

use crate::sdk::{
    DeviceDescriptor, DeviceHandle, DeviceSdk, OfflineCallback, RawDepth, RawFrame, RawImage,
    SdkError, StreamFormat, StreamKind, StreamMask, TriggerMode,
};
use crate::testing::synthetic_data::{
    synthetic_color_formats, synthetic_color_frame, synthetic_depth_frame, synthetic_descriptor,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const ERR_INVALID_HANDLE: i32 = -1001;
pub const ERR_NOT_STREAMING: i32 = -1014;
pub const ERR_TIMEOUT: i32 = -1012;
pub const ERR_OFFLINE: i32 = -1017;
pub const ERR_BAD_FRAME: i32 = -1020;

struct OpenDevice {
    serial: String,
    format: Option<StreamFormat>,
    mask: StreamMask,
    trigger_mode: TriggerMode,
    streaming: bool,
    pending_triggers: u32,
    offline: bool,
    callbacks: Vec<Arc<dyn Fn() + Send + Sync>>,
    callback_before_stream_on: bool,
}

struct SimState {
    devices: Vec<DeviceDescriptor>,
    formats: Vec<StreamFormat>,
    next_handle: u64,
    open: HashMap<u64, OpenDevice>,
    frame_interval: Duration,
    color_channels: u8,
    omit_color: bool,
    fail_open: Option<i32>,
    fail_enable: Option<i32>,
    fail_default_parameters: Option<i32>,
    failing_reads: usize,
    frame_number: u64,
    trigger_count: u64,
    read_count: u64,
    last_read_timeout_ms: Option<u32>,
    callback_before_stream_on: bool,
}

pub struct SimulatedSdk {
    state: Mutex<SimState>,
}

impl SimulatedSdk {
    /// One simulated device.
    pub fn new() -> Self {
        Self::with_devices(&["207000106930"])
    }

    pub fn with_devices(serials: &[&str]) -> Self {
        Self {
            state: Mutex::new(SimState {
                devices: serials.iter().map(|s| synthetic_descriptor(s)).collect(),
                formats: synthetic_color_formats(),
                next_handle: 1,
                open: HashMap::new(),
                frame_interval: Duration::from_millis(10),
                color_channels: 3,
                omit_color: false,
                fail_open: None,
                fail_enable: None,
                fail_default_parameters: None,
                failing_reads: 0,
                frame_number: 0,
                trigger_count: 0,
                read_count: 0,
                last_read_timeout_ms: None,
                callback_before_stream_on: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time each frame batch takes to arrive.
    pub fn set_frame_interval(&self, interval: Duration) {
        self.state().frame_interval = interval;
    }

    pub fn set_color_formats(&self, formats: Vec<StreamFormat>) {
        self.state().formats = formats;
    }

    /// Channel count of decoded color images.
    pub fn set_color_channels(&self, channels: u8) {
        self.state().color_channels = channels;
    }

    /// Leave color frames out of read batches.
    pub fn omit_color_frames(&self, omit: bool) {
        self.state().omit_color = omit;
    }

    pub fn fail_open(&self, code: i32) {
        self.state().fail_open = Some(code);
    }

    pub fn fail_enable(&self, code: i32) {
        self.state().fail_enable = Some(code);
    }

    pub fn fail_default_parameters(&self, code: i32) {
        self.state().fail_default_parameters = Some(code);
    }

    /// Make the next `count` frame reads fail with a timeout.
    pub fn fail_next_reads(&self, count: usize) {
        self.state().failing_reads = count;
    }

    /// Unplug every open device and fire their offline callbacks.
    pub fn simulate_offline(&self) {
        let callbacks: Vec<_> = {
            let mut state = self.state();
            state
                .open
                .values_mut()
                .flat_map(|dev| {
                    dev.offline = true;
                    dev.callbacks.clone()
                })
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn open_handles(&self) -> usize {
        self.state().open.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.state().open.values().any(|d| d.streaming)
    }

    pub fn trigger_count(&self) -> u64 {
        self.state().trigger_count
    }

    pub fn read_count(&self) -> u64 {
        self.state().read_count
    }

    pub fn last_read_timeout_ms(&self) -> Option<u32> {
        self.state().last_read_timeout_ms
    }

    /// Whether the last stream-on happened after an offline callback was registered.
    pub fn callback_registered_before_stream_on(&self) -> bool {
        self.state().callback_before_stream_on
    }

    fn with_device<T>(
        &self,
        handle: DeviceHandle,
        f: impl FnOnce(&mut OpenDevice) -> Result<T, SdkError>,
    ) -> Result<T, SdkError> {
        let mut state = self.state();
        let dev = state
            .open
            .get_mut(&handle.0)
            .ok_or_else(|| SdkError::new(ERR_INVALID_HANDLE, "invalid handle"))?;
        f(dev)
    }
}

impl Default for SimulatedSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSdk for SimulatedSdk {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, SdkError> {
        Ok(self.state().devices.clone())
    }

    fn open(&self, serial: &str) -> Result<DeviceHandle, SdkError> {
        let mut state = self.state();
        if let Some(code) = state.fail_open {
            return Err(SdkError::new(code, "device busy"));
        }
        if !state.devices.iter().any(|d| d.id == serial) {
            return Err(SdkError::new(ERR_INVALID_HANDLE, format!("no device {serial}")));
        }

        let id = state.next_handle;
        state.next_handle += 1;
        state.open.insert(
            id,
            OpenDevice {
                serial: serial.to_string(),
                format: None,
                mask: StreamMask::empty(),
                trigger_mode: TriggerMode::Off,
                streaming: false,
                pending_triggers: 0,
                offline: false,
                callbacks: Vec::new(),
                callback_before_stream_on: false,
            },
        );
        Ok(DeviceHandle(id))
    }

    fn register_offline_callback(
        &self,
        handle: DeviceHandle,
        callback: OfflineCallback,
    ) -> Result<(), SdkError> {
        self.with_device(handle, |dev| {
            dev.callbacks.push(Arc::from(callback));
            if !dev.streaming {
                dev.callback_before_stream_on = true;
            }
            Ok(())
        })
    }

    fn stream_formats(
        &self,
        handle: DeviceHandle,
        stream: StreamKind,
    ) -> Result<Vec<StreamFormat>, SdkError> {
        let formats = self.state().formats.clone();
        self.with_device(handle, |_| match stream {
            StreamKind::Color => Ok(formats),
            StreamKind::Depth => Ok(formats.into_iter().take(1).collect()),
        })
    }

    fn configure_stream(
        &self,
        handle: DeviceHandle,
        _stream: StreamKind,
        format: &StreamFormat,
    ) -> Result<(), SdkError> {
        self.with_device(handle, |dev| {
            dev.format = Some(format.clone());
            Ok(())
        })
    }

    fn set_trigger_mode(&self, handle: DeviceHandle, mode: TriggerMode) -> Result<(), SdkError> {
        self.with_device(handle, |dev| {
            dev.trigger_mode = mode;
            Ok(())
        })
    }

    fn load_default_parameters(&self, handle: DeviceHandle) -> Result<(), SdkError> {
        let fail = self.state().fail_default_parameters;
        self.with_device(handle, |_| match fail {
            Some(code) => Err(SdkError::new(code, "custom block missing")),
            None => Ok(()),
        })
    }

    fn enable_streams(&self, handle: DeviceHandle, mask: StreamMask) -> Result<(), SdkError> {
        let fail = self.state().fail_enable;
        self.with_device(handle, |dev| match fail {
            Some(code) => Err(SdkError::new(code, "stream enable rejected")),
            None => {
                dev.mask = mask;
                Ok(())
            }
        })
    }

    fn stream_on(&self, handle: DeviceHandle) -> Result<(), SdkError> {
        let mut state = self.state();
        let dev = state
            .open
            .get_mut(&handle.0)
            .ok_or_else(|| SdkError::new(ERR_INVALID_HANDLE, "invalid handle"))?;
        if dev.format.is_none() || dev.mask == StreamMask::empty() {
            return Err(SdkError::new(ERR_NOT_STREAMING, "no stream configured"));
        }
        dev.streaming = true;
        let registered = dev.callback_before_stream_on;
        state.callback_before_stream_on = registered;
        Ok(())
    }

    fn stream_off(&self, handle: DeviceHandle) -> Result<(), SdkError> {
        self.with_device(handle, |dev| {
            dev.streaming = false;
            dev.pending_triggers = 0;
            Ok(())
        })
    }

    fn close(&self, handle: DeviceHandle) -> Result<(), SdkError> {
        let mut state = self.state();
        match state.open.remove(&handle.0) {
            Some(dev) => {
                log::trace!("simulated close of {}", dev.serial);
                Ok(())
            }
            None => Err(SdkError::new(ERR_INVALID_HANDLE, "invalid handle")),
        }
    }

    fn send_trigger(&self, handle: DeviceHandle) -> Result<(), SdkError> {
        let mut state = self.state();
        state.trigger_count += 1;
        let dev = state
            .open
            .get_mut(&handle.0)
            .ok_or_else(|| SdkError::new(ERR_INVALID_HANDLE, "invalid handle"))?;
        if dev.offline {
            return Err(SdkError::new(ERR_OFFLINE, "device offline"));
        }
        dev.pending_triggers = dev.pending_triggers.saturating_add(1);
        Ok(())
    }

    fn read_frames(&self, handle: DeviceHandle, timeout_ms: u32) -> Result<Vec<RawFrame>, SdkError> {
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        let (frames, wait) = {
            let mut state = self.state();
            state.read_count += 1;
            state.last_read_timeout_ms = Some(timeout_ms);
            let interval = state.frame_interval;

            if state.failing_reads > 0 {
                state.failing_reads -= 1;
                return Err(SdkError::new(ERR_TIMEOUT, "frame read timeout"));
            }

            let color_channels = state.color_channels;
            let omit_color = state.omit_color;
            state.frame_number += 1;
            let frame_number = state.frame_number;

            let dev = state
                .open
                .get_mut(&handle.0)
                .ok_or_else(|| SdkError::new(ERR_INVALID_HANDLE, "invalid handle"))?;
            if dev.offline {
                return Err(SdkError::new(ERR_OFFLINE, "device offline"));
            }
            if !dev.streaming {
                return Err(SdkError::new(ERR_NOT_STREAMING, "stream not started"));
            }

            if dev.trigger_mode == TriggerMode::Slave {
                if dev.pending_triggers == 0 {
                    (Vec::new(), interval.min(timeout))
                } else {
                    dev.pending_triggers -= 1;
                    (batch(dev, frame_number, color_channels, omit_color), interval.min(timeout))
                }
            } else {
                (batch(dev, frame_number, color_channels, omit_color), interval.min(timeout))
            }
        };

        std::thread::sleep(wait);
        Ok(frames)
    }

    fn decode_color(&self, frame: &RawFrame) -> Result<RawImage, SdkError> {
        let pixels = frame.width as usize * frame.height as usize;
        if frame.stream != StreamKind::Color || pixels == 0 || frame.data.len() % pixels != 0 {
            return Err(SdkError::new(ERR_BAD_FRAME, "not a decodable color frame"));
        }
        Ok(RawImage {
            width: frame.width,
            height: frame.height,
            channels: (frame.data.len() / pixels) as u8,
            data: frame.data.clone(),
        })
    }

    fn render_depth(&self, frame: &RawFrame) -> Result<RawDepth, SdkError> {
        if frame.stream != StreamKind::Depth || frame.data.len() % 2 != 0 {
            return Err(SdkError::new(ERR_BAD_FRAME, "not a depth frame"));
        }
        Ok(RawDepth {
            width: frame.width,
            height: frame.height,
            data: frame
                .data
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect(),
        })
    }
}

fn batch(dev: &OpenDevice, frame_number: u64, color_channels: u8, omit_color: bool) -> Vec<RawFrame> {
    let (width, height) = dev
        .format
        .as_ref()
        .map(|f| (f.width, f.height))
        .unwrap_or((320, 240));

    let mut frames = Vec::with_capacity(2);
    if dev.mask.contains(StreamMask::DEPTH) {
        frames.push(synthetic_depth_frame(frame_number, width, height));
    }
    if dev.mask.contains(StreamMask::COLOR) && !omit_color {
        frames.push(synthetic_color_frame(frame_number, width, height, color_channels));
    }
    frames
}
