//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last track
    #[default]
    Off,
    /// Replay the current track when it finishes
    One,
    /// Wrap around at both ends of the queue
    All,
}

impl RepeatMode {
    /// Next mode in the OFF → ONE → ALL → OFF cycle
    pub fn cycled(self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }
}

/// Lifecycle status of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerStatus {
    /// No track loaded
    #[default]
    Idle,
    /// Resolving or loading a stream
    Loading,
    Playing,
    Paused,
    Stopped,
    /// Last attempt failed; a retry or skip follows
    Error,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Retries after the first failed attempt of a track
    pub max_retries: u32,

    /// Delay before skipping a track whose retries are exhausted
    #[serde(with = "duration_millis")]
    pub skip_delay: Duration,

    /// Initial volume (0-100)
    pub initial_volume: u8,

    /// Start with visualization on
    pub visualizer_enabled: bool,

    /// Per-subscriber buffer for player events and frames
    pub event_capacity: usize,

    /// Seed shuffle for reproducible order; random when `None`
    pub shuffle_seed: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            skip_delay: Duration::from_secs(1),
            initial_volume: 80,
            visualizer_enabled: true,
            event_capacity: 256,
            shuffle_seed: None,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
