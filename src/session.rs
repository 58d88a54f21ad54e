use crate::config::PercipioCameraConfig;
use crate::errors::CameraError;
use crate::health::DeviceHealthMonitor;
use crate::sdk::{
    DeviceDescriptor, DeviceHandle, DeviceSdk, StreamFormat, StreamKind, StreamMask,
};
use std::sync::Arc;

/// An opened device with its streams running.
///
/// Owns the SDK handle exclusively; dropping the session without calling
/// [`StreamSession::disconnect`] still stops the stream and closes the handle.
pub struct StreamSession {
    sdk: Arc<dyn DeviceSdk>,
    handle: Option<DeviceHandle>,
    device: DeviceDescriptor,
    format: StreamFormat,
    mask: StreamMask,
    health: DeviceHealthMonitor,
}

impl StreamSession {
    pub fn connect(
        sdk: Arc<dyn DeviceSdk>,
        config: &PercipioCameraConfig,
    ) -> Result<Self, CameraError> {
        let devices = sdk.list_devices()?;
        for (idx, dev) in devices.iter().enumerate() {
            log::debug!("{} -- {}\t{}", idx, dev.id, dev.interface_id);
        }
        let device = select_device(devices, config)?;

        let handle = sdk.open(&device.id).map_err(|e| CameraError::OpenFailed {
            serial: device.id.clone(),
            code: e.code,
            description: e.description,
        })?;

        // From here on the handle must be closed if setup fails.
        match setup_streams(sdk.as_ref(), handle, config) {
            Ok((format, mask, health)) => {
                log::info!(
                    "Opened {} {} ({}x{} {})",
                    device.model_name,
                    device.id,
                    format.width,
                    format.height,
                    format.description
                );
                Ok(Self {
                    sdk,
                    handle: Some(handle),
                    device,
                    format,
                    mask,
                    health,
                })
            }
            Err(e) => {
                if let Err(close_err) = sdk.close(handle) {
                    log::warn!("Failed to close {} after setup error: {}", device.id, close_err);
                }
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop streaming and close the device.
    pub fn disconnect(&mut self) -> Result<(), CameraError> {
        let handle = self.handle.take().ok_or(CameraError::NotConnected)?;

        if let Err(e) = self.sdk.stream_off(handle) {
            log::warn!("Failed to stop stream on {}: {}", self.device.id, e);
        }
        self.sdk.close(handle)?;

        log::info!("Closed {}", self.device.id);
        Ok(())
    }

    pub fn handle(&self) -> Result<DeviceHandle, CameraError> {
        self.handle.ok_or(CameraError::NotConnected)
    }

    pub fn sdk(&self) -> &dyn DeviceSdk {
        self.sdk.as_ref()
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn mask(&self) -> StreamMask {
        self.mask
    }

    pub fn health(&self) -> &DeviceHealthMonitor {
        &self.health
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.disconnect() {
                log::warn!("Error closing session in drop: {}", e);
            }
        }
    }
}

fn select_device(
    devices: Vec<DeviceDescriptor>,
    config: &PercipioCameraConfig,
) -> Result<DeviceDescriptor, CameraError> {
    if devices.is_empty() {
        return Err(CameraError::NoDeviceFound);
    }

    if let Some(serial) = &config.serial_number {
        return devices
            .into_iter()
            .find(|d| &d.id == serial)
            .ok_or_else(|| CameraError::DeviceNotFound(serial.clone()));
    }

    if let Some(index) = config.device_index {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            CameraError::DeviceNotFound(format!("index {index} of {count} devices"))
        });
    }

    let count = devices.len();
    if count > 1 {
        return Err(CameraError::AmbiguousDevice { count });
    }
    devices.into_iter().next().ok_or(CameraError::NoDeviceFound)
}

fn setup_streams(
    sdk: &dyn DeviceSdk,
    handle: DeviceHandle,
    config: &PercipioCameraConfig,
) -> Result<(StreamFormat, StreamMask, DeviceHealthMonitor), CameraError> {
    // Registered before stream-on so no offline event is missed.
    let health = DeviceHealthMonitor::new();
    sdk.register_offline_callback(handle, health.callback())?;

    let formats = sdk.stream_formats(handle, StreamKind::Color)?;
    for (idx, fmt) in formats.iter().enumerate() {
        log::debug!("\t{} -size[{}x{}]\t-\t desc:{}", idx, fmt.width, fmt.height, fmt.description);
    }
    let format = select_format(formats, config)?;
    sdk.configure_stream(handle, StreamKind::Color, &format)?;

    sdk.set_trigger_mode(handle, config.trigger_mode)?;

    match sdk.load_default_parameters(handle) {
        Ok(()) => log::debug!("Loaded default device parameters"),
        Err(e) => log::warn!("Load default parameters failed: {}", e),
    }

    let mask = if config.use_depth {
        StreamMask::COLOR | StreamMask::DEPTH
    } else {
        StreamMask::COLOR
    };
    sdk.enable_streams(handle, mask)
        .map_err(|e| CameraError::StreamEnableFailed {
            code: e.code,
            description: e.description,
        })?;

    sdk.stream_on(handle)?;
    Ok((format, mask, health))
}

fn select_format(
    formats: Vec<StreamFormat>,
    config: &PercipioCameraConfig,
) -> Result<StreamFormat, CameraError> {
    match (config.width, config.height) {
        (Some(width), Some(height)) => formats
            .into_iter()
            .find(|f| f.width == width && f.height == height)
            .ok_or_else(|| {
                CameraError::NoStreamFormat(format!("{} at {}x{}", StreamKind::Color, width, height))
            }),
        _ => formats
            .into_iter()
            .next()
            .ok_or_else(|| CameraError::NoStreamFormat(StreamKind::Color.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedSdk;

    fn sdk_with(serials: &[&str]) -> Arc<SimulatedSdk> {
        Arc::new(SimulatedSdk::with_devices(serials))
    }

    #[test]
    fn test_connect_single_device() {
        let sdk = sdk_with(&["A1"]);
        let session = StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default()).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.device().id, "A1");
        assert_eq!(session.mask(), StreamMask::COLOR);
        assert!(sdk.is_streaming());
    }

    #[test]
    fn test_no_device() {
        let sdk = sdk_with(&[]);
        let result = StreamSession::connect(sdk, &PercipioCameraConfig::default());
        assert!(matches!(result, Err(CameraError::NoDeviceFound)));
    }

    #[test]
    fn test_multiple_devices_need_selector() {
        let sdk = sdk_with(&["A1", "B2"]);
        let result = StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default());
        assert!(matches!(result, Err(CameraError::AmbiguousDevice { count: 2 })));

        let mut config = PercipioCameraConfig::default();
        config.device_index = Some(1);
        let session = StreamSession::connect(sdk.clone(), &config).unwrap();
        assert_eq!(session.device().id, "B2");
    }

    #[test]
    fn test_select_by_serial() {
        let sdk = sdk_with(&["A1", "B2"]);
        let session =
            StreamSession::connect(sdk.clone(), &PercipioCameraConfig::with_serial("A1")).unwrap();
        assert_eq!(session.device().id, "A1");

        let result = StreamSession::connect(sdk, &PercipioCameraConfig::with_serial("ZZ"));
        assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
    }

    #[test]
    fn test_open_failure() {
        let sdk = sdk_with(&["A1"]);
        sdk.fail_open(-1010);
        let result = StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default());
        assert!(matches!(result, Err(CameraError::OpenFailed { code: -1010, .. })));
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_enable_failure_closes_handle() {
        let sdk = sdk_with(&["A1"]);
        sdk.fail_enable(-1005);
        let result = StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default());
        assert!(matches!(
            result,
            Err(CameraError::StreamEnableFailed { code: -1005, .. })
        ));
        assert_eq!(sdk.open_handles(), 0);
        assert!(!sdk.is_streaming());
    }

    #[test]
    fn test_default_parameter_failure_is_not_fatal() {
        let sdk = sdk_with(&["A1"]);
        sdk.fail_default_parameters(-1001);
        let session = StreamSession::connect(sdk, &PercipioCameraConfig::default());
        assert!(session.is_ok());
    }

    #[test]
    fn test_format_selection() {
        let sdk = sdk_with(&["A1"]);
        let mut config = PercipioCameraConfig::default();
        config.width = Some(640);
        config.height = Some(480);
        let session = StreamSession::connect(sdk.clone(), &config).unwrap();
        assert_eq!(session.format().width, 640);
        drop(session);

        config.width = Some(7);
        config.height = Some(7);
        let result = StreamSession::connect(sdk.clone(), &config);
        assert!(matches!(result, Err(CameraError::NoStreamFormat(_))));
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_depth_mask() {
        let sdk = sdk_with(&["A1"]);
        let config = PercipioCameraConfig::default().with_depth();
        let session = StreamSession::connect(sdk, &config).unwrap();
        assert!(session.mask().contains(StreamMask::DEPTH));
    }

    #[test]
    fn test_offline_callback_registered_before_stream_on() {
        let sdk = sdk_with(&["A1"]);
        let session = StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default()).unwrap();
        assert!(sdk.callback_registered_before_stream_on());
        sdk.simulate_offline();
        assert!(session.health().is_offline());
    }

    #[test]
    fn test_disconnect_twice() {
        let sdk = sdk_with(&["A1"]);
        let mut session =
            StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default()).unwrap();
        session.disconnect().unwrap();
        assert!(!session.is_connected());
        assert_eq!(sdk.open_handles(), 0);
        assert!(matches!(session.disconnect(), Err(CameraError::NotConnected)));
    }

    #[test]
    fn test_drop_closes_handle() {
        let sdk = sdk_with(&["A1"]);
        let session = StreamSession::connect(sdk.clone(), &PercipioCameraConfig::default()).unwrap();
        assert_eq!(sdk.open_handles(), 1);
        drop(session);
        assert_eq!(sdk.open_handles(), 0);
    }
}
