//! Aria Core
//!
//! Platform-agnostic types, collaborator traits and event plumbing shared by
//! the playback engine and the audio pipeline.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `MediaId`, `StreamSource`
//! - **Collaborator Traits**: `StreamResolver`, `PlayRecorder`
//! - **Event Channels**: `EventBus`, a multi-subscriber bounded channel
//! - **Error Handling**: Unified `AriaError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use aria_core::{EventBus, MediaId, Track};
//!
//! let track = Track::new("t-1", "Song", "Artist").with_media_id(MediaId::new("dQw4w9WgXcQ"));
//! assert!(track.is_playable());
//!
//! let bus: EventBus<String> = EventBus::new(8);
//! let rx = bus.subscribe();
//! bus.publish("hello".to_string());
//! assert_eq!(rx.try_recv().unwrap(), "hello");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::{AriaError, Result};
pub use events::EventBus;
pub use traits::{NoopRecorder, PlayRecorder, StreamResolver};
pub use types::{MediaId, StreamSource, Track, TrackId};
