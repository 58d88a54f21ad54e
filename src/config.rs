//! Configuration for Percipio cameras
//!
//! Provides the camera configuration, its validation rules, and TOML
//! loading/saving.

use crate::errors::CameraError;
use crate::sdk::TriggerMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound on `warmup_s`
pub const MAX_WARMUP_S: u64 = 600;

/// Channel order of processed color images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Rgb,
    Bgr,
}

impl FromStr for ColorMode {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(ColorMode::Rgb),
            "bgr" => Ok(ColorMode::Bgr),
            _ => Err(CameraError::InvalidColorMode(s.to_string())),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Rgb => write!(f, "rgb"),
            ColorMode::Bgr => write!(f, "bgr"),
        }
    }
}

/// Clockwise image rotation, serialized as degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Whether width and height swap after rotating
    pub fn is_transposing(self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = String;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Rotate90),
            180 => Ok(Rotation::Rotate180),
            270 | -90 => Ok(Rotation::Rotate270),
            other => Err(format!(
                "rotation must be one of 0, 90, 180, 270 degrees, got {other}"
            )),
        }
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Timeouts and pacing of the acquisition path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Ceiling handed to the SDK for each frame batch read
    pub hardware_timeout_ms: u32,
    /// Budget of one capture-loop iteration
    pub loop_read_timeout_ms: u64,
    /// How long disconnect waits for the capture thread
    pub stop_timeout_ms: u64,
    /// Grace period for a lingering capture thread before a restart
    pub restart_grace_ms: u64,
    /// Pause after a failed capture-loop iteration
    pub error_backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hardware_timeout_ms: 20_000,
            loop_read_timeout_ms: 500,
            stop_timeout_ms: 2_000,
            restart_grace_ms: 100,
            error_backoff_ms: 20,
        }
    }
}

/// Percipio camera configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercipioCameraConfig {
    /// Serial number of the device to open
    pub serial_number: Option<String>,
    /// Enumeration index, used when no serial number is given
    pub device_index: Option<usize>,
    /// Requested color resolution; first reported format when unset
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Enable the depth stream next to color
    pub use_depth: bool,
    /// Depth-to-color registration; must be set together with `use_depth`
    pub registration_mode: bool,
    pub color_mode: ColorMode,
    pub rotation: Rotation,
    /// Seconds of frames read and discarded after connect
    pub warmup_s: u64,
    pub trigger_mode: TriggerMode,
    pub timing: TimingConfig,
}

impl Default for PercipioCameraConfig {
    fn default() -> Self {
        Self {
            serial_number: None,
            device_index: None,
            width: None,
            height: None,
            use_depth: false,
            registration_mode: false,
            color_mode: ColorMode::Rgb,
            rotation: Rotation::None,
            warmup_s: 1,
            trigger_mode: TriggerMode::Slave,
            timing: TimingConfig::default(),
        }
    }
}

impl PercipioCameraConfig {
    pub fn with_serial(serial: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial.into()),
            ..Self::default()
        }
    }

    /// Enable depth together with registration
    pub fn with_depth(mut self) -> Self {
        self.use_depth = true;
        self.registration_mode = true;
        self
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: PercipioCameraConfig =
            toml::from_str(&contents).map_err(|e| CameraError::ConfigParse(e.to_string()))?;
        config.validate()?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| CameraError::ConfigParse(e.to_string()))?;
        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("percipio.toml")
    }

    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.use_depth != self.registration_mode {
            return Err(CameraError::InvalidConfig(
                "use_depth and registration_mode must either both be set or both be unset"
                    .to_string(),
            ));
        }

        match (self.width, self.height) {
            (Some(0), _) | (_, Some(0)) => {
                return Err(CameraError::InvalidConfig(
                    "width and height must be non-zero".to_string(),
                ))
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(CameraError::InvalidConfig(
                    "width and height must be given together".to_string(),
                ))
            }
            _ => {}
        }

        if self.serial_number.as_deref() == Some("") {
            return Err(CameraError::InvalidConfig(
                "serial_number must not be empty".to_string(),
            ));
        }

        if self.warmup_s > MAX_WARMUP_S {
            return Err(CameraError::InvalidConfig(format!(
                "warmup_s must be at most {MAX_WARMUP_S}, got {}",
                self.warmup_s
            )));
        }

        let timing = &self.timing;
        if timing.hardware_timeout_ms == 0 || timing.loop_read_timeout_ms == 0 {
            return Err(CameraError::InvalidConfig(
                "read timeouts must be non-zero".to_string(),
            ));
        }
        if u64::from(timing.hardware_timeout_ms) < timing.loop_read_timeout_ms {
            return Err(CameraError::InvalidConfig(
                "hardware_timeout_ms must not be below loop_read_timeout_ms".to_string(),
            ));
        }
        if timing.stop_timeout_ms == 0 {
            return Err(CameraError::InvalidConfig(
                "stop_timeout_ms must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
