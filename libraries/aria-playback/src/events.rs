//! Player events
//!
//! Published to every subscriber of the controller. Events are emitted:
//! - when the playing flag flips (backend playing/paused/stopped)
//! - when the current track changes, including to none
//! - when the whole-second position changes
//! - when playback fails in a way the user should see
//! - when the queue or shuffle/repeat modes change

use crate::types::RepeatMode;
use aria_core::Track;
use std::sync::Arc;

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playing flag changed
    StateChanged {
        /// Whether audio is now playing
        playing: bool,
    },

    /// Current track changed, `None` once playback stops
    TrackChanged(Option<Arc<Track>>),

    /// Playback position, whole seconds
    TimeChanged {
        /// Position in seconds
        seconds: u64,
    },

    /// User-visible failure
    Error {
        /// Message for display
        message: String,
    },

    /// Queue contents changed
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// Shuffle or repeat changed
    ModeChanged {
        shuffle: bool,
        repeat: RepeatMode,
    },
}

impl PlayerEvent {
    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
