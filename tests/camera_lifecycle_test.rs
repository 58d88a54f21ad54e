#[cfg(test)]
mod camera_lifecycle_tests {
    use percipio_camera::testing::SimulatedSdk;
    use percipio_camera::{CameraError, ColorMode, PercipioCamera, PercipioCameraConfig, Rotation};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn camera_with(config: PercipioCameraConfig) -> (Arc<SimulatedSdk>, PercipioCamera) {
        let sdk = Arc::new(SimulatedSdk::new());
        let camera = PercipioCamera::new(config, sdk.clone()).expect("valid config");
        (sdk, camera)
    }

    #[test]
    fn test_invalid_config_fails_before_hardware() {
        let sdk = Arc::new(SimulatedSdk::new());
        let mut config = PercipioCameraConfig::default();
        config.use_depth = true;

        let result = PercipioCamera::new(config, sdk.clone());
        assert!(matches!(result, Err(CameraError::InvalidConfig(_))));
        assert_eq!(sdk.open_handles(), 0);
        assert_eq!(sdk.read_count(), 0);

        let mut config = PercipioCameraConfig::default();
        config.registration_mode = true;
        assert!(PercipioCamera::new(config, sdk).is_err());
    }

    #[test]
    fn test_oversized_warmup_rejected_at_construction() {
        let sdk = Arc::new(SimulatedSdk::new());
        let mut config = PercipioCameraConfig::default();
        config.warmup_s = u64::MAX;

        let result = PercipioCamera::new(config, sdk.clone());
        assert!(matches!(result, Err(CameraError::InvalidConfig(_))));
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let (sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        assert!(!camera.is_connected());

        camera.connect(false).unwrap();
        assert!(camera.is_connected());
        assert!(sdk.is_streaming());
        assert_eq!(camera.device().unwrap().id, "207000106930");
        assert_eq!(camera.stream_format().unwrap().width, 320);

        camera.disconnect().unwrap();
        assert!(!camera.is_connected());
        assert!(!sdk.is_streaming());
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_double_connect_rejected() {
        let (_sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        camera.connect(false).unwrap();
        assert!(matches!(
            camera.connect(false),
            Err(CameraError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_disconnect_when_disconnected() {
        let (_sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        assert!(matches!(camera.disconnect(), Err(CameraError::NotConnected)));

        camera.connect(false).unwrap();
        camera.disconnect().unwrap();
        assert!(matches!(camera.disconnect(), Err(CameraError::NotConnected)));
    }

    #[test]
    fn test_failed_connect_leaves_nothing_open() {
        let (sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        sdk.fail_enable(-1005);
        assert!(matches!(
            camera.connect(false),
            Err(CameraError::StreamEnableFailed { .. })
        ));
        assert!(!camera.is_connected());
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_no_device() {
        let sdk = Arc::new(SimulatedSdk::with_devices(&[]));
        let mut camera = PercipioCamera::new(PercipioCameraConfig::default(), sdk).unwrap();
        assert!(matches!(
            camera.connect(false),
            Err(CameraError::NoDeviceFound)
        ));
    }

    #[test]
    fn test_find_cameras() {
        let sdk = SimulatedSdk::with_devices(&["A1", "B2"]);
        let found = PercipioCamera::find_cameras(&sdk).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "A1");
        assert_eq!(found[1].vendor_name, "Percipio");
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_read_requires_connection() {
        let (_sdk, camera) = camera_with(PercipioCameraConfig::default());
        assert!(matches!(camera.read(None, 200), Err(CameraError::NotConnected)));
        assert!(matches!(camera.read_depth(200), Err(CameraError::NotConnected)));
    }

    #[test]
    fn test_read_color() {
        let mut config = PercipioCameraConfig::default();
        config.rotation = Rotation::Rotate90;
        let (_sdk, mut camera) = camera_with(config);
        camera.connect(false).unwrap();

        let frame = camera.read(Some(ColorMode::Bgr), 200).unwrap().unwrap();
        assert_eq!(frame.image.dimensions(), (240, 320));
        assert_eq!(frame.color_mode, ColorMode::Bgr);
    }

    #[test]
    fn test_read_depth_disabled() {
        let (_sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        camera.connect(false).unwrap();
        assert!(matches!(camera.read_depth(200), Err(CameraError::DepthDisabled)));
    }

    #[test]
    fn test_read_depth_enabled() {
        let (_sdk, mut camera) = camera_with(PercipioCameraConfig::default().with_depth());
        camera.connect(false).unwrap();
        let depth = camera.read_depth(200).unwrap().unwrap();
        assert_eq!(depth.image.dimensions(), (320, 240));
        assert!(depth.image.pixels().all(|p| p.0[0] >= 500));
    }

    #[test]
    fn test_soft_miss_returns_none() {
        let (sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        camera.connect(false).unwrap();
        sdk.omit_color_frames(true);
        assert!(camera.read(None, 200).unwrap().is_none());
    }

    #[test]
    fn test_warmup_discards_frames() {
        let mut config = PercipioCameraConfig::default();
        config.warmup_s = 1;
        let (sdk, mut camera) = camera_with(config);

        let start = Instant::now();
        camera.connect(true).unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(sdk.read_count() >= 2);

        // Warmup frames are not handed out as fresh async frames.
        let frame = camera.async_read(1_000).unwrap();
        assert!(frame.sequence > 1);
    }

    #[test]
    fn test_warmup_failure_disconnects() {
        let mut config = PercipioCameraConfig::default();
        config.warmup_s = 1;
        let (sdk, mut camera) = camera_with(config);
        sdk.set_frame_interval(Duration::from_millis(1));

        let sdk_for_thread = sdk.clone();
        let unplug = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            sdk_for_thread.simulate_offline();
        });

        let result = camera.connect(true);
        unplug.join().unwrap();
        assert!(matches!(result, Err(CameraError::DeviceOffline)));
        assert!(!camera.is_connected());
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let (sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        camera.connect(false).unwrap();
        camera.async_read(1_000).unwrap();
        camera.disconnect().unwrap();

        camera.connect(false).unwrap();
        assert!(camera.async_read(1_000).is_ok());
        camera.disconnect().unwrap();
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_drop_releases_device() {
        let (sdk, mut camera) = camera_with(PercipioCameraConfig::default());
        camera.connect(false).unwrap();
        camera.async_read(1_000).unwrap();
        drop(camera);
        assert_eq!(sdk.open_handles(), 0);
    }

    #[test]
    fn test_display_uses_serial() {
        let (_sdk, camera) = camera_with(PercipioCameraConfig::with_serial("207000106930"));
        assert_eq!(camera.to_string(), "PercipioCamera(207000106930)");
    }
}
