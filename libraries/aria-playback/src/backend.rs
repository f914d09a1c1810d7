//! Playback backend abstraction
//!
//! A backend decodes one stream at a time and pushes PCM through the
//! [`AudioCallbackRouter`] it was built with. Lifecycle changes travel back
//! to the controller as [`BackendEvent`]s on a channel, so a backend never
//! calls into controller state from its own threads.
//!
//! Every load carries a [`LoadId`] chosen by the controller. End-of-stream
//! and failure events echo it back, so an event that was already queued
//! when the controller moved on to another track can be told apart from
//! one about the track now playing.

use aria_audio::{AudioCallbackRouter, EqualizerTarget};
use aria_core::StreamSource;
use crossbeam_channel::Sender;
use std::time::Duration;

/// Identifies one `load_and_play` call
pub type LoadId = u64;

/// Lifecycle notifications from the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Playing,
    Paused,
    Stopped,
    /// Stream of the given load reached its end
    Finished(LoadId),
    /// Decode or output failure after the given load was accepted
    Error(LoadId, String),
    /// Current playback position
    TimeChanged(Duration),
}

/// Decode/output engine driven by the controller
///
/// Commands must return promptly; long work belongs on the backend's own
/// thread. Calls after [`release`](Self::release) are ignored.
pub trait PlaybackBackend: EqualizerTarget + Send + Sync {
    /// Start playing `source`, replacing whatever was loaded
    ///
    /// `Finished` and `Error` events for this stream carry `load`.
    fn load_and_play(&self, load: LoadId, source: &StreamSource) -> aria_core::Result<()>;

    fn pause(&self);

    fn resume(&self);

    fn stop(&self);

    fn seek(&self, position: Duration);

    /// Volume 0-100
    fn set_volume(&self, volume: u8);

    /// Tear down threads and devices
    fn release(&self);
}

/// What a backend factory receives
pub struct BackendContext {
    /// Lifecycle event channel, drained by the controller
    pub events: Sender<BackendEvent>,

    /// PCM sink to call from the real-time thread
    pub sink: AudioCallbackRouter,
}
