//! Volume control with logarithmic scaling
//!
//! Volume range is 0-100, mapped to -60 dB..0 dB. Zero is silence.

use super::AudioEffect;

/// Volume stage
#[derive(Debug, Clone)]
pub struct Volume {
    level: u8,
    linear_gain: f32,
}

impl Volume {
    /// Create a volume stage, `level` is clamped to 100
    pub fn new(level: u8) -> Self {
        let level = level.min(100);
        Self {
            level,
            linear_gain: Self::calculate_linear_gain(level),
        }
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(100);
        self.linear_gain = Self::calculate_linear_gain(self.level);
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn gain(&self) -> f32 {
        self.linear_gain
    }

    /// gain = 10^((level - 100) * 0.6 / 20)
    fn calculate_linear_gain(level: u8) -> f32 {
        if level == 0 {
            return 0.0;
        }
        let db = (f32::from(level) - 100.0) * 0.6;
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(80)
    }
}

impl AudioEffect for Volume {
    fn process(&mut self, buffer: &mut [f32], _sample_rate: u32) {
        let gain = self.linear_gain;
        if gain == 0.0 {
            buffer.fill(0.0);
        } else if gain != 1.0 {
            for sample in buffer.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Volume"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped() {
        assert_eq!(Volume::new(250).level(), 100);
        let mut volume = Volume::default();
        volume.set_level(101);
        assert_eq!(volume.level(), 100);
    }

    #[test]
    fn gain_curve_endpoints() {
        assert_eq!(Volume::new(0).gain(), 0.0);
        assert_eq!(Volume::new(100).gain(), 1.0);
        assert!((Volume::new(50).gain() - 0.0316).abs() < 1e-3);
    }

    #[test]
    fn gain_is_monotonic() {
        let gains: Vec<f32> = (0..=100).map(|l| Volume::new(l).gain()).collect();
        assert!(gains.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_volume_silences() {
        let mut volume = Volume::new(0);
        let mut buffer = vec![0.5; 8];
        volume.process(&mut buffer, 44_100);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}
