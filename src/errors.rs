use crate::sdk::SdkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera is not connected")]
    NotConnected,
    #[error("camera is already connected")]
    AlreadyConnected,
    #[error("no Percipio device found")]
    NoDeviceFound,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("{count} devices found, select one by serial number or index")]
    AmbiguousDevice { count: usize },
    #[error("failed to open device {serial} (code {code}): {description}")]
    OpenFailed {
        serial: String,
        code: i32,
        description: String,
    },
    #[error("device reports no format for the {0} stream")]
    NoStreamFormat(String),
    #[error("failed to enable streams (code {code}): {description}")]
    StreamEnableFailed { code: i32, description: String },
    #[error("device offline")]
    DeviceOffline,
    #[error("depth stream is not enabled")]
    DepthDisabled,
    #[error("frame shape mismatch: {0}")]
    FrameShapeMismatch(String),
    #[error("invalid color mode '{0}', expected rgb or bgr")]
    InvalidColorMode(String),
    #[error("timed out waiting for frame after {timeout_ms} ms (read thread alive: {thread_alive})")]
    Timeout { timeout_ms: u64, thread_alive: bool },
    #[error("frame signalled but no frame buffered")]
    EmptyBuffer,
    #[error("capture thread did not stop within {0} ms")]
    StopTimeout(u64),
    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),
    #[error("lock poisoned by previous panic")]
    PoisonedLock,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

impl CameraError {
    /// Whether retrying the same call without reconnecting can succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CameraError::Timeout { .. } | CameraError::StopTimeout(_) | CameraError::Sdk(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for CameraError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CameraError::PoisonedLock
    }
}
