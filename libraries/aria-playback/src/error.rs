//! Error types for playback management

use aria_core::AriaError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Output device or backend failed to initialize; the engine cannot start
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Backend rejected a command
    #[error("Backend error: {0}")]
    Backend(String),

    /// Background worker thread could not be started or has stopped
    #[error("Background worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Equalizer or other audio-path error
    #[error(transparent)]
    Audio(#[from] aria_audio::AudioError),

    #[error(transparent)]
    Core(#[from] AriaError),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
