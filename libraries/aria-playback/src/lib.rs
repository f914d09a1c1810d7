//! Aria Playback
//!
//! Queue and transport state machine for the Aria player.
//!
//! This crate provides:
//! - Queue with retained original order (shuffle on/off is reversible)
//! - Shuffle (uniform Fisher-Yates) and repeat modes (Off, One, All)
//! - Retry-driven stream resolution on a background worker
//! - Auto-advance on track end, skip after repeated failures
//! - Player events and visualization frames for any number of subscribers
//!
//! # Architecture
//!
//! `aria-playback` knows nothing about decoding or audio devices. A
//! [`PlaybackBackend`] does the decoding and is built by a factory that
//! receives the event channel and the [`aria_audio::AudioCallbackRouter`] it
//! must feed. Stream resolution and play history are injected as
//! [`aria_core::StreamResolver`] and [`aria_core::PlayRecorder`].
//!
//! [`PlaybackController`] lives on one context (a UI thread or a CLI loop)
//! and is advanced by calling [`PlaybackController::pump`] or
//! [`PlaybackController::pump_timeout`] from that context.
//!
//! # Example
//!
//! ```rust,no_run
//! use aria_audio::{EqualizerSettings, EqualizerTarget, OutputDevice};
//! use aria_core::{MediaId, NoopRecorder, StreamSource, Track};
//! use aria_playback::{
//!     BackendContext, DirectResolver, LoadId, PlaybackBackend, PlaybackConfig, PlaybackController,
//! };
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! struct NullOutput;
//! impl OutputDevice for NullOutput {
//!     fn write(&mut self, pcm: &[u8]) -> aria_audio::Result<usize> {
//!         Ok(pcm.len())
//!     }
//! }
//!
//! struct NullBackend(Mutex<BackendContext>);
//! impl EqualizerTarget for NullBackend {
//!     fn apply_equalizer(&self, _settings: Option<EqualizerSettings>) {}
//! }
//! impl PlaybackBackend for NullBackend {
//!     fn load_and_play(&self, _load: LoadId, _source: &StreamSource) -> aria_core::Result<()> { Ok(()) }
//!     fn pause(&self) {}
//!     fn resume(&self) {}
//!     fn stop(&self) {}
//!     fn seek(&self, _position: Duration) {}
//!     fn set_volume(&self, _volume: u8) {}
//!     fn release(&self) {}
//! }
//!
//! let mut player = PlaybackController::new(
//!     PlaybackConfig::default(),
//!     Arc::new(DirectResolver),
//!     Arc::new(NoopRecorder),
//!     Box::new(NullOutput),
//!     |ctx| Ok(NullBackend(Mutex::new(ctx))),
//! )?;
//!
//! let events = player.subscribe();
//! let track = Track::new("1", "Song", "Artist").with_media_id(MediaId::new("/music/song.flac"));
//! player.set_queue_and_play(vec![Arc::new(track)], 0);
//!
//! loop {
//!     player.pump_timeout(Duration::from_millis(50));
//!     while let Ok(event) = events.try_recv() {
//!         println!("{event:?}");
//!     }
//! }
//! # Ok::<(), aria_playback::PlaybackError>(())
//! ```

mod backend;
mod controller;
mod error;
mod events;
mod queue;
mod resolver;
mod shuffle;
pub mod types;
mod worker;

// Public exports
pub use backend::{BackendContext, BackendEvent, LoadId, PlaybackBackend};
pub use controller::PlaybackController;
pub use error::{PlaybackError, Result};
pub use events::PlayerEvent;
pub use queue::Queue;
pub use resolver::{source_from_url, DirectResolver, YtDlpResolver};
pub use types::{PlaybackConfig, PlayerStatus, RepeatMode};
