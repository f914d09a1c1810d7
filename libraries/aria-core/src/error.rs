/// Core error types for Aria
use thiserror::Error;

/// Result type alias using `AriaError`
pub type Result<T> = std::result::Result<T, AriaError>;

/// Core error type for Aria
#[derive(Error, Debug)]
pub enum AriaError {
    /// No playable source could be obtained for a media id
    #[error("Stream resolution failed: {0}")]
    Resolution(String),

    /// Device or decoder fault during playback
    #[error("Playback error: {0}")]
    BackendPlayback(String),

    /// Output device or playback backend cannot initialize
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Track is missing its playable-source reference
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Play history could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AriaError {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a backend playback error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendPlayback(msg.into())
    }

    /// Create a device unavailable error
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    /// Create an invalid track error
    pub fn invalid_track(msg: impl Into<String>) -> Self {
        Self::InvalidTrack(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Whether the engine retries after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolution(_) | Self::BackendPlayback(_))
    }
}
