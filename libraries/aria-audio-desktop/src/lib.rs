//! Desktop audio for Aria
//!
//! Platform pieces behind the playback engine's traits:
//!
//! - [`CpalOutputDevice`]: default output device at 44.1 kHz stereo, fed
//!   through a lock-free ring
//! - [`SymphoniaBackend`]: decodes files and HTTP streams, applies the
//!   equalizer and volume, and drives the callback router
//! - [`Recorder`]: default input device to a 16-bit WAV file
//!
//! # Example
//!
//! ```no_run
//! use aria_audio_desktop::{CpalOutputDevice, SymphoniaBackend};
//! use aria_core::NoopRecorder;
//! use aria_playback::{DirectResolver, PlaybackConfig, PlaybackController};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let output = CpalOutputDevice::open()?;
//! let mut player = PlaybackController::new(
//!     PlaybackConfig::default(),
//!     Arc::new(DirectResolver),
//!     Arc::new(NoopRecorder),
//!     Box::new(output),
//!     |ctx| Ok(SymphoniaBackend::spawn(ctx)?),
//! )?;
//! player.set_volume(60);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
pub mod decoder;
mod error;
mod output;
mod recorder;

pub use backend::SymphoniaBackend;
pub use decoder::{SourceLocation, StreamDecoder};
pub use error::{DesktopError, Result};
pub use output::CpalOutputDevice;
pub use recorder::{wav_spec, write_wav, InputFeed, Recorder};
