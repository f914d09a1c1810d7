//! 10-band peaking equalizer with preamp
//!
//! Renders an [`EqualizerSettings`] snapshot: one RBJ peaking biquad per
//! band at the equalizer's centre frequencies, preceded by a uniform preamp
//! gain. `None` settings bypass processing entirely.

use super::AudioEffect;
use crate::equalizer::{EqualizerSettings, BAND_COUNT, BAND_FREQUENCIES};
use std::f32::consts::PI;

/// Octave-ish bandwidth for the 10 bands
const BAND_Q: f32 = 1.41;

#[derive(Debug, Clone)]
struct BiquadBand {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    // Filter state, [left, right]
    x1: [f32; 2],
    x2: [f32; 2],
    y1: [f32; 2],
    y2: [f32; 2],

    frequency: f32,
    gain_db: f32,
}

impl BiquadBand {
    fn new(frequency: f32) -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: [0.0; 2],
            x2: [0.0; 2],
            y1: [0.0; 2],
            y2: [0.0; 2],
            frequency,
            gain_db: 0.0,
        }
    }

    fn is_identity(&self) -> bool {
        self.gain_db.abs() < 0.01
    }

    fn update_coefficients(&mut self, sample_rate: f32) {
        if sample_rate < 1.0 || self.is_identity() {
            self.b0 = 1.0;
            self.b1 = 0.0;
            self.b2 = 0.0;
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }

        let a = 10.0_f32.powf(self.gain_db / 40.0);
        // Keep clear of Nyquist; 16 kHz at 32 kHz input would be unstable.
        let frequency = self.frequency.min(sample_rate * 0.45);
        let omega = 2.0 * PI * frequency / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * BAND_Q);

        let a0 = 1.0 + alpha / a;
        self.b0 = (1.0 + alpha * a) / a0;
        self.b1 = (-2.0 * cos_omega) / a0;
        self.b2 = (1.0 - alpha * a) / a0;
        self.a1 = (-2.0 * cos_omega) / a0;
        self.a2 = (1.0 - alpha / a) / a0;
    }

    #[inline]
    fn process(&mut self, channel: usize, input: f32) -> f32 {
        let mut out = self.b0 * input + self.b1 * self.x1[channel] + self.b2 * self.x2[channel]
            - self.a1 * self.y1[channel]
            - self.a2 * self.y2[channel];

        // Flush denormals
        if out.abs() < 1e-15 {
            out = 0.0;
        }

        self.x2[channel] = self.x1[channel];
        self.x1[channel] = input;
        self.y2[channel] = self.y1[channel];
        self.y1[channel] = out;
        out
    }

    fn reset(&mut self) {
        self.x1 = [0.0; 2];
        self.x2 = [0.0; 2];
        self.y1 = [0.0; 2];
        self.y2 = [0.0; 2];
    }
}

/// Equalizer DSP for a playback backend
pub struct GraphicEq {
    bands: [BiquadBand; BAND_COUNT],
    preamp_gain: f32,
    settings: Option<EqualizerSettings>,
    sample_rate: u32,
    needs_update: bool,
}

impl GraphicEq {
    /// Bypassed equalizer
    pub fn new() -> Self {
        Self {
            bands: BAND_FREQUENCIES.map(BiquadBand::new),
            preamp_gain: 1.0,
            settings: None,
            sample_rate: 44_100,
            needs_update: true,
        }
    }

    /// Apply a snapshot, `None` bypasses
    pub fn set_settings(&mut self, settings: Option<EqualizerSettings>) {
        if let Some(settings) = settings {
            for (band, &gain) in self.bands.iter_mut().zip(settings.bands.iter()) {
                band.gain_db = gain;
            }
            self.preamp_gain = 10.0_f32.powf(settings.preamp / 20.0);
        } else {
            self.reset();
        }
        self.settings = settings;
        self.needs_update = true;
    }

    pub fn settings(&self) -> Option<EqualizerSettings> {
        self.settings
    }

    pub fn is_bypassed(&self) -> bool {
        self.settings.is_none()
    }

    fn update_coefficients(&mut self) {
        if self.needs_update {
            let sample_rate = self.sample_rate as f32;
            for band in &mut self.bands {
                band.update_coefficients(sample_rate);
            }
            self.needs_update = false;
        }
    }
}

impl Default for GraphicEq {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for GraphicEq {
    fn process(&mut self, buffer: &mut [f32], sample_rate: u32) {
        if self.settings.is_none() {
            return;
        }

        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.reset();
            self.needs_update = true;
        }
        self.update_coefficients();

        let preamp = self.preamp_gain;
        for frame in buffer.chunks_exact_mut(2) {
            for (channel, sample) in frame.iter_mut().enumerate() {
                let mut value = *sample * preamp;
                for band in self.bands.iter_mut().filter(|b| !b.is_identity()) {
                    value = band.process(channel, value);
                }
                *sample = value;
            }
        }
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }

    fn name(&self) -> &str {
        "10-Band Equalizer"
    }
}
