//! Spectrum and waveform analyzer
//!
//! The analyzer lives on the real-time callback thread. It accumulates mono
//! samples into a fixed 1024-sample window and, each time the window fills,
//! publishes a [`VisualizationFrame`] with a 64-bar log-compressed spectrum
//! and the raw window as waveform.
//!
//! The UI side holds a [`Visualizer`] handle that subscribes to frames and
//! turns visualization on or off. Turning it off publishes one all-zero frame
//! so displays go flat instead of freezing on stale data.

use aria_core::EventBus;
use crossbeam_channel::Receiver;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Samples per analysis window (about 23 ms at 44.1 kHz)
pub const ANALYSIS_WINDOW: usize = 1024;

/// Number of spectrum bars per frame
pub const SPECTRUM_BARS: usize = 64;

/// Scale applied after log compression
const SPECTRUM_SCALE: f32 = 3.5;

/// One published visualization update
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationFrame {
    /// Bar heights in [0.0, 1.0]
    pub spectrum: [f32; SPECTRUM_BARS],
    /// The analysed window, verbatim
    pub waveform: [f32; ANALYSIS_WINDOW],
}

impl VisualizationFrame {
    /// All-zero frame
    pub fn silent() -> Self {
        Self {
            spectrum: [0.0; SPECTRUM_BARS],
            waveform: [0.0; ANALYSIS_WINDOW],
        }
    }

    pub fn is_silent(&self) -> bool {
        self.spectrum.iter().all(|&v| v == 0.0) && self.waveform.iter().all(|&v| v == 0.0)
    }

    /// Index and height of the tallest bar
    pub fn peak_bar(&self) -> (usize, f32) {
        self.spectrum
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (i, v)| if v > best.1 { (i, v) } else { best })
    }
}

struct VisualizerShared {
    enabled: AtomicBool,
    /// Bumped on every clear; the analyzer resets its window when it sees a new value
    epoch: AtomicU64,
}

/// UI-side handle for visualization
#[derive(Clone)]
pub struct Visualizer {
    shared: Arc<VisualizerShared>,
    frames: EventBus<Arc<VisualizationFrame>>,
}

impl Visualizer {
    /// Create a visualizer whose subscribers buffer `capacity` frames
    pub fn new(enabled: bool, capacity: usize) -> Self {
        Self {
            shared: Arc::new(VisualizerShared {
                enabled: AtomicBool::new(enabled),
                epoch: AtomicU64::new(0),
            }),
            frames: EventBus::new(capacity),
        }
    }

    /// Receive published frames
    pub fn subscribe(&self) -> Receiver<Arc<VisualizationFrame>> {
        self.frames.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Turn visualization on or off
    ///
    /// Turning it off clears the analyzer and publishes one silent frame.
    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = self.shared.enabled.swap(enabled, Ordering::AcqRel);
        if was_enabled && !enabled {
            self.clear();
        }
    }

    /// Zero the analysis window and publish one silent frame
    pub fn clear(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.frames.publish(Arc::new(VisualizationFrame::silent()));
        tracing::debug!("Visualizer cleared");
    }

    /// Create the real-time analyzer bound to this handle
    pub fn analyzer(&self) -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(Arc::clone(&self.shared), self.frames.clone())
    }
}

/// Real-time FFT analyzer, owned by the audio callback thread
pub struct SpectrumAnalyzer {
    window: Vec<f32>,
    write_pos: usize,
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    shared: Arc<VisualizerShared>,
    seen_epoch: u64,
    frames: EventBus<Arc<VisualizationFrame>>,
}

impl SpectrumAnalyzer {
    fn new(shared: Arc<VisualizerShared>, frames: EventBus<Arc<VisualizationFrame>>) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(ANALYSIS_WINDOW);
        let scratch_len = fft.get_inplace_scratch_len();
        let seen_epoch = shared.epoch.load(Ordering::Acquire);

        Self {
            window: vec![0.0; ANALYSIS_WINDOW],
            write_pos: 0,
            fft,
            fft_buffer: vec![Complex::new(0.0, 0.0); ANALYSIS_WINDOW],
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; ANALYSIS_WINDOW / 2],
            shared,
            seen_epoch,
            frames,
        }
    }

    /// Whether the UI wants frames
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Samples accumulated toward the next frame
    pub fn pending_samples(&self) -> usize {
        self.write_pos
    }

    /// Accumulate mono samples, returns the number of frames published
    pub fn process_samples(&mut self, samples: &[f32]) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        self.sync_epoch();

        let mut published = 0;
        let mut input = samples;
        while !input.is_empty() {
            let take = (ANALYSIS_WINDOW - self.write_pos).min(input.len());
            self.window[self.write_pos..self.write_pos + take].copy_from_slice(&input[..take]);
            self.write_pos += take;
            input = &input[take..];

            if self.write_pos == ANALYSIS_WINDOW {
                if self.publish_frame() {
                    published += 1;
                }
                self.write_pos = 0;
            }
        }
        published
    }

    fn sync_epoch(&mut self) {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.window.fill(0.0);
            self.write_pos = 0;
        }
    }

    fn publish_frame(&mut self) -> bool {
        let mut frame = VisualizationFrame::silent();
        frame.waveform.copy_from_slice(&self.window);
        self.compute_spectrum(&mut frame.spectrum);

        let epoch = self.seen_epoch;
        let shared = &self.shared;
        // Checked under the subscriber lock so a concurrent clear always wins.
        self.frames.try_publish_if(Arc::new(frame), || {
            shared.enabled.load(Ordering::Acquire) && shared.epoch.load(Ordering::Acquire) == epoch
        }) > 0
    }

    fn compute_spectrum(&mut self, bars: &mut [f32; SPECTRUM_BARS]) {
        for (slot, &sample) in self.fft_buffer.iter_mut().zip(&self.window) {
            *slot = Complex::new(sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.fft_buffer) {
            *mag = c.norm();
        }
        bin_magnitudes(&self.magnitudes, bars);
    }
}

/// Group magnitudes into bars
///
/// Each bar averages `max(1, len / bars)` consecutive bins; bins past the
/// last full group are dropped. The average is compressed with
/// `log10(1 + avg) * 3.5` and clamped to [0, 1]; NaN becomes 0.
pub fn bin_magnitudes(magnitudes: &[f32], bars: &mut [f32]) {
    if bars.is_empty() {
        return;
    }
    let width = (magnitudes.len() / bars.len()).max(1);

    for (i, bar) in bars.iter_mut().enumerate() {
        let start = i * width;
        if start >= magnitudes.len() {
            *bar = 0.0;
            continue;
        }
        let end = (start + width).min(magnitudes.len());
        let sum: f32 = magnitudes[start..end].iter().sum();
        let average = sum / width as f32;
        let value = (1.0 + average).log10() * SPECTRUM_SCALE;
        *bar = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    }
}
