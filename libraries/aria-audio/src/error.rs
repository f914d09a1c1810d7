use thiserror::Error;

/// Errors raised by the audio path
#[derive(Debug, Error)]
pub enum AudioError {
    /// Output or input device could not be opened
    #[error("Audio device error: {0}")]
    Device(String),

    /// Stream could not be built, started or written
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Equalizer preset name not in the preset table
    #[error("Unknown equalizer preset: {0}")]
    UnknownPreset(String),

    /// Equalizer band index out of range
    #[error("Equalizer band {0} out of range (0-9)")]
    BandOutOfRange(usize),

    /// A panic was caught at the real-time callback boundary
    #[error("Audio callback panicked: {0}")]
    CallbackPanic(String),

    /// Source could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;
