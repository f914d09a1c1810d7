//! Aria Audio
//!
//! The real-time half of the player: everything that runs on, or feeds, the
//! playback backend's audio callback thread.
//!
//! - [`AudioCallbackRouter`]: forwards each PCM chunk to the output device
//!   and the analyzer without blocking or letting faults escape
//! - [`SpectrumAnalyzer`] / [`Visualizer`]: 1024-sample FFT, 64-bar spectrum
//!   and waveform frames for the UI
//! - [`Equalizer`]: preamp + 10-band gain model with presets, applied to the
//!   backend as whole snapshots
//! - [`effects`]: DSP stages (equalizer filters, volume) for backends that
//!   render audio themselves
//!
//! # Example
//!
//! ```rust
//! use aria_audio::{AudioCallbackRouter, OutputDevice, PcmSink, Visualizer};
//!
//! struct Discard;
//! impl OutputDevice for Discard {
//!     fn write(&mut self, pcm: &[u8]) -> aria_audio::Result<usize> {
//!         Ok(pcm.len())
//!     }
//! }
//!
//! let visualizer = Visualizer::new(true, 8);
//! let frames = visualizer.subscribe();
//! let (faults_tx, _faults_rx) = crossbeam_channel::bounded(8);
//! let (mut router, _gate) =
//!     AudioCallbackRouter::new(Box::new(Discard), visualizer.analyzer(), faults_tx);
//!
//! router.on_pcm(&vec![0u8; 1024 * 4]);
//! assert_eq!(frames.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analyzer;
pub mod effects;
pub mod equalizer;
mod error;
pub mod pcm;
pub mod router;

pub use analyzer::{SpectrumAnalyzer, VisualizationFrame, Visualizer, ANALYSIS_WINDOW, SPECTRUM_BARS};
pub use effects::{AudioEffect, GraphicEq, Volume};
pub use equalizer::{
    available_presets, band_frequencies, EqPreset, Equalizer, EqualizerSettings, EqualizerTarget, BAND_COUNT,
    BAND_FREQUENCIES, BAND_LABELS,
};
pub use error::{AudioError, Result};
pub use router::{AudioCallbackRouter, OutputDevice, PcmSink, RouterGate};
