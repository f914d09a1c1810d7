//! Equalizer state
//!
//! Holds the user-facing equalizer model: a preamp plus ten band gains in
//! dB, each clamped to [-20, +20]. Every change is pushed to the
//! [`EqualizerTarget`] as one complete [`EqualizerSettings`] snapshot, so the
//! backend never sees the preamp and bands out of step.

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of equalizer bands
pub const BAND_COUNT: usize = 10;

/// Band centre frequencies (Hz)
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] = [
    60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0, 14000.0, 16000.0,
];

/// Display labels for the bands
pub const BAND_LABELS: [&str; BAND_COUNT] = [
    "60 Hz", "170 Hz", "310 Hz", "600 Hz", "1 kHz", "3 kHz", "6 kHz", "12 kHz", "14 kHz", "16 kHz",
];

/// Lowest accepted gain (dB)
pub const MIN_GAIN_DB: f32 = -20.0;

/// Highest accepted gain (dB)
pub const MAX_GAIN_DB: f32 = 20.0;

fn clamp_gain(db: f32) -> f32 {
    if db.is_nan() {
        0.0
    } else {
        db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
    }
}

/// Complete gain set applied to the backend in one step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EqualizerSettings {
    /// Uniform gain before the bands (dB)
    pub preamp: f32,
    /// Per-band gain (dB)
    pub bands: [f32; BAND_COUNT],
}

impl EqualizerSettings {
    /// All zero
    pub const FLAT: Self = Self {
        preamp: 0.0,
        bands: [0.0; BAND_COUNT],
    };

    pub fn is_flat(&self) -> bool {
        self.preamp == 0.0 && self.bands.iter().all(|&b| b == 0.0)
    }
}

/// Receiver of equalizer snapshots
///
/// `None` means bypass: no equalization at all.
pub trait EqualizerTarget: Send + Sync {
    fn apply_equalizer(&self, settings: Option<EqualizerSettings>);
}

/// Built-in presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EqPreset {
    Flat,
    Rock,
    Pop,
    Jazz,
    Classical,
    BassBoost,
    TrebleBoost,
    VocalBoost,
}

impl EqPreset {
    /// Every preset, in display order
    pub const ALL: [EqPreset; 8] = [
        Self::Flat,
        Self::Rock,
        Self::Pop,
        Self::Jazz,
        Self::Classical,
        Self::BassBoost,
        Self::TrebleBoost,
        Self::VocalBoost,
    ];

    /// Band gains for this preset
    pub fn gains(&self) -> [f32; BAND_COUNT] {
        match self {
            Self::Flat => [0.0; BAND_COUNT],
            Self::Rock => [5.0, 3.0, -3.0, -5.0, -2.0, 2.0, 5.0, 7.0, 7.0, 7.0],
            Self::Pop => [-1.0, 3.0, 5.0, 5.0, 3.0, 0.0, -1.0, -1.0, -1.0, -1.0],
            Self::Jazz => [4.0, 3.0, 1.0, 2.0, -2.0, -2.0, 0.0, 2.0, 4.0, 5.0],
            Self::Classical => [5.0, 4.0, 3.0, 2.0, -1.0, -1.0, 0.0, 2.0, 4.0, 5.0],
            Self::BassBoost => [8.0, 6.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Self::TrebleBoost => [0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 8.0, 9.0],
            Self::VocalBoost => [-2.0, -2.0, -1.0, 1.0, 4.0, 4.0, 3.0, 1.0, 0.0, -1.0],
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "Flat",
            Self::Rock => "Rock",
            Self::Pop => "Pop",
            Self::Jazz => "Jazz",
            Self::Classical => "Classical",
            Self::BassBoost => "Bass Boost",
            Self::TrebleBoost => "Treble Boost",
            Self::VocalBoost => "Vocal Boost",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }
}

/// Band centre frequencies, low to high
pub fn band_frequencies() -> [f32; BAND_COUNT] {
    BAND_FREQUENCIES
}

/// Names of all presets, in display order
pub fn available_presets() -> Vec<&'static str> {
    EqPreset::ALL.iter().map(EqPreset::name).collect()
}

/// Equalizer model bound to a target
pub struct Equalizer {
    enabled: bool,
    settings: EqualizerSettings,
    /// Preset the bands currently match, `None` after manual edits
    preset: Option<EqPreset>,
    target: Arc<dyn EqualizerTarget>,
}

impl Equalizer {
    /// Flat, disabled equalizer
    pub fn new(target: Arc<dyn EqualizerTarget>) -> Self {
        Self {
            enabled: false,
            settings: EqualizerSettings::FLAT,
            preset: Some(EqPreset::Flat),
            target,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable (apply stored gains) or bypass
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.target.apply_equalizer(Some(self.settings));
        } else {
            self.target.apply_equalizer(None);
        }
        tracing::debug!(enabled, "Equalizer toggled");
    }

    /// Copy of the stored gain set
    pub fn settings(&self) -> EqualizerSettings {
        self.settings
    }

    pub fn preamp(&self) -> f32 {
        self.settings.preamp
    }

    pub fn set_preamp(&mut self, db: f32) {
        self.settings.preamp = clamp_gain(db);
        self.apply_if_enabled();
    }

    pub fn band_gain(&self, index: usize) -> Result<f32> {
        self.settings
            .bands
            .get(index)
            .copied()
            .ok_or(AudioError::BandOutOfRange(index))
    }

    /// Copy of all band gains
    pub fn band_gains(&self) -> [f32; BAND_COUNT] {
        self.settings.bands
    }

    pub fn set_band_gain(&mut self, index: usize, db: f32) -> Result<()> {
        let band = self
            .settings
            .bands
            .get_mut(index)
            .ok_or(AudioError::BandOutOfRange(index))?;
        *band = clamp_gain(db);
        self.preset = None;
        self.apply_if_enabled();
        Ok(())
    }

    pub fn set_all_band_gains(&mut self, gains: [f32; BAND_COUNT]) {
        self.settings.bands = gains.map(clamp_gain);
        self.preset = None;
        self.apply_if_enabled();
    }

    /// Load a preset by name (case-insensitive)
    ///
    /// Unknown names leave the state untouched.
    pub fn load_preset(&mut self, name: &str) -> Result<EqPreset> {
        let preset =
            EqPreset::from_name(name).ok_or_else(|| AudioError::UnknownPreset(name.to_string()))?;
        self.set_all_band_gains(preset.gains());
        self.preset = Some(preset);
        tracing::info!(preset = preset.name(), "Loaded equalizer preset");
        Ok(preset)
    }

    /// Preset the current bands came from
    pub fn preset(&self) -> Option<EqPreset> {
        self.preset
    }

    /// Zero preamp and bands
    pub fn reset(&mut self) {
        self.settings = EqualizerSettings::FLAT;
        self.preset = Some(EqPreset::Flat);
        self.apply_if_enabled();
    }

    /// Push the stored gains again, e.g. after the backend loaded a new source
    pub fn reapply(&self) {
        self.apply_if_enabled();
    }

    fn apply_if_enabled(&self) {
        if self.enabled {
            self.target.apply_equalizer(Some(self.settings));
        }
    }
}
