//! Real-time audio callback router
//!
//! The playback backend hands every decoded PCM chunk to a [`PcmSink`] on
//! its real-time thread. [`AudioCallbackRouter`] is that sink: it forwards
//! the bytes to the output device and, when visualization is on, feeds a
//! mono downmix to the [`SpectrumAnalyzer`].
//!
//! Nothing may escape the callback. Each step returns `Result`, and
//! `on_pcm` is the single boundary that turns errors and panics into a
//! non-blocking publish on the fault channel.

use crate::analyzer::SpectrumAnalyzer;
use crate::error::{AudioError, Result};
use crate::pcm;
use crossbeam_channel::Sender;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mono scratch capacity; larger chunks grow it once
const MONO_CAPACITY: usize = 8192;

/// Platform output device
pub trait OutputDevice: Send {
    /// Write S16 interleaved stereo bytes, returns how many were accepted
    ///
    /// Must not block. Accepting fewer bytes than offered is a short write.
    fn write(&mut self, pcm: &[u8]) -> Result<usize>;
}

/// Receiver of decoded PCM on the backend's real-time thread
pub trait PcmSink: Send {
    fn on_pcm(&mut self, pcm: &[u8]);
}

/// Closes the router once the engine shuts down
#[derive(Clone)]
pub struct RouterGate(Arc<AtomicBool>);

impl RouterGate {
    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// PCM sink that feeds the output device and the analyzer
pub struct AudioCallbackRouter {
    output: Box<dyn OutputDevice>,
    analyzer: SpectrumAnalyzer,
    mono: Vec<f32>,
    faults: Sender<AudioError>,
    gate: RouterGate,
    /// Faults since the last clean chunk; only the first of a run is reported
    consecutive_faults: u64,
}

impl AudioCallbackRouter {
    /// Create a router and the gate that shuts it off
    pub fn new(
        output: Box<dyn OutputDevice>,
        analyzer: SpectrumAnalyzer,
        faults: Sender<AudioError>,
    ) -> (Self, RouterGate) {
        let gate = RouterGate(Arc::new(AtomicBool::new(true)));
        let router = Self {
            output,
            analyzer,
            mono: Vec::with_capacity(MONO_CAPACITY),
            faults,
            gate: gate.clone(),
            consecutive_faults: 0,
        };
        (router, gate)
    }

    fn route(&mut self, pcm: &[u8]) -> Result<()> {
        let forwarded = self.forward_to_output(pcm);
        self.feed_analyzer(pcm);
        forwarded
    }

    fn forward_to_output(&mut self, pcm: &[u8]) -> Result<()> {
        let written = self.output.write(pcm)?;
        if written < pcm.len() {
            tracing::trace!(
                offered = pcm.len(),
                written,
                "Short write to output device, dropping remainder"
            );
        }
        Ok(())
    }

    fn feed_analyzer(&mut self, pcm: &[u8]) {
        if !self.analyzer.is_enabled() {
            return;
        }
        pcm::downmix_to_mono(pcm, &mut self.mono);
        self.analyzer.process_samples(&self.mono);
    }

    fn report(&mut self, fault: AudioError) {
        self.consecutive_faults += 1;
        if self.consecutive_faults == 1 {
            tracing::warn!(error = %fault, "Audio callback fault");
            // Full channel: the controller already has faults to report.
            let _ = self.faults.try_send(fault);
        }
    }
}

impl PcmSink for AudioCallbackRouter {
    fn on_pcm(&mut self, pcm: &[u8]) {
        if !self.gate.is_open() {
            return;
        }

        match catch_unwind(AssertUnwindSafe(|| self.route(pcm))) {
            Ok(Ok(())) => self.consecutive_faults = 0,
            Ok(Err(err)) => self.report(err),
            Err(payload) => self.report(AudioError::CallbackPanic(panic_message(&*payload))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
