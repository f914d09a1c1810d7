/// Collaborator traits consumed by the playback engine
use crate::error::Result;
use crate::types::{MediaId, StreamSource, TrackId};
use async_trait::async_trait;

/// Stream resolver trait
///
/// Turns a track's external media id into a time-limited playable source.
/// Implementations perform network or process I/O and are only ever called
/// from the engine's background worker, never from the UI-facing context or
/// the real-time audio thread.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve a media id to a playable source
    ///
    /// # Errors
    /// Returns `AriaError::Resolution` if no playable source can be obtained
    async fn resolve(&self, media_id: &MediaId) -> Result<StreamSource>;
}

/// Play history collaborator
///
/// Called once per track change, fire-and-forget. Failures are logged by
/// the caller and never affect playback.
#[async_trait]
pub trait PlayRecorder: Send + Sync {
    /// Record that a track started playing
    ///
    /// # Errors
    /// Returns `AriaError::Persistence` if the play could not be stored
    async fn record_play(&self, track_id: &TrackId) -> Result<()>;
}

/// Recorder that discards every play
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

#[async_trait]
impl PlayRecorder for NoopRecorder {
    async fn record_play(&self, _track_id: &TrackId) -> Result<()> {
        Ok(())
    }
}
