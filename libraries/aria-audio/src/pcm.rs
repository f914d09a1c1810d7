//! PCM format shared by the backend, the router and the output device
//!
//! Decoded audio crosses the callback boundary as signed 16-bit native-endian
//! interleaved stereo at 44.1 kHz, four bytes per frame.

/// Sample rate of PCM delivered to the router
pub const SAMPLE_RATE: u32 = 44_100;

/// Interleaved channel count
pub const CHANNELS: usize = 2;

/// Bytes per sample (S16)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bytes per interleaved frame
pub const BYTES_PER_FRAME: usize = CHANNELS * BYTES_PER_SAMPLE;

/// Number of whole frames in a PCM byte slice
///
/// A trailing partial frame is ignored.
pub fn frame_count(pcm: &[u8]) -> usize {
    pcm.len() / BYTES_PER_FRAME
}

/// Downmix S16 interleaved stereo to mono floats in [-1.0, 1.0]
///
/// Writes into `out` after clearing it. When `out` was created with enough
/// capacity for the chunk no allocation happens.
pub fn downmix_to_mono(pcm: &[u8], out: &mut Vec<f32>) -> usize {
    out.clear();
    for frame in pcm.chunks_exact(BYTES_PER_FRAME) {
        let left = i16::from_ne_bytes([frame[0], frame[1]]);
        let right = i16::from_ne_bytes([frame[2], frame[3]]);
        let mixed = (f32::from(left) + f32::from(right)) * 0.5 / 32768.0;
        out.push(mixed);
    }
    out.len()
}

/// Convert one float sample to S16 with clipping
#[inline]
pub fn f32_to_s16(sample: f32) -> i16 {
    let scaled = (sample * 32767.0).round();
    if scaled.is_nan() {
        0
    } else {
        scaled.clamp(-32768.0, 32767.0) as i16
    }
}

/// Encode interleaved floats as S16 native-endian bytes into `out`
pub fn encode_s16(samples: &[f32], out: &mut Vec<u8>) {
    out.clear();
    for &sample in samples {
        out.extend_from_slice(&f32_to_s16(sample).to_ne_bytes());
    }
}

/// Decode S16 native-endian bytes into floats
pub fn decode_s16(pcm: &[u8], out: &mut Vec<f32>) {
    out.clear();
    for sample in pcm.chunks_exact(BYTES_PER_SAMPLE) {
        out.push(f32::from(i16::from_ne_bytes([sample[0], sample[1]])) / 32768.0);
    }
}
