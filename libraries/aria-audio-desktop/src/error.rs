/// Desktop audio errors
use aria_core::AriaError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, DesktopError>;

/// Desktop audio errors
#[derive(Debug, Error)]
pub enum DesktopError {
    /// No default device for the requested direction
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device refused the requested format or could not be queried
    #[error("Device error: {0}")]
    Device(String),

    /// Failed to build a stream
    #[error("Failed to build stream: {0}")]
    StreamBuild(String),

    /// Failed to start a stream
    #[error("Failed to play stream: {0}")]
    StreamPlay(String),

    /// Source could not be opened
    #[error("Failed to open source: {0}")]
    Open(String),

    /// Source could not be probed or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    Resample(String),

    /// Remote source could not be downloaded
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// WAV file could not be written
    #[error("Recording error: {0}")]
    Recording(String),

    /// A worker thread could not be started or went away
    #[error("Audio thread error: {0}")]
    Thread(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<cpal::BuildStreamError> for DesktopError {
    fn from(err: cpal::BuildStreamError) -> Self {
        DesktopError::StreamBuild(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for DesktopError {
    fn from(err: cpal::PlayStreamError) -> Self {
        DesktopError::StreamPlay(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for DesktopError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        DesktopError::Device(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for DesktopError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        DesktopError::Decode(err.to_string())
    }
}

impl From<hound::Error> for DesktopError {
    fn from(err: hound::Error) -> Self {
        DesktopError::Recording(err.to_string())
    }
}

impl From<DesktopError> for AriaError {
    fn from(err: DesktopError) -> Self {
        match err {
            DesktopError::DeviceNotFound
            | DesktopError::Device(_)
            | DesktopError::StreamBuild(_)
            | DesktopError::StreamPlay(_) => AriaError::device_unavailable(err.to_string()),
            other => AriaError::backend(other.to_string()),
        }
    }
}

impl From<DesktopError> for aria_audio::AudioError {
    fn from(err: DesktopError) -> Self {
        match err {
            DesktopError::DeviceNotFound | DesktopError::Device(_) => {
                aria_audio::AudioError::Device(err.to_string())
            }
            DesktopError::Decode(_) | DesktopError::Resample(_) => {
                aria_audio::AudioError::Decode(err.to_string())
            }
            DesktopError::Io(e) => aria_audio::AudioError::Io(e),
            other => aria_audio::AudioError::Stream(other.to_string()),
        }
    }
}
