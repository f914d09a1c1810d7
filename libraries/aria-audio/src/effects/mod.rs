//! DSP stages run by playback backends before PCM reaches the router
mod graphic_eq;
mod volume;

pub use graphic_eq::GraphicEq;
pub use volume::Volume;

/// In-place processing stage for interleaved stereo f32 audio
///
/// # Real-Time Constraints
/// - No allocations in `process()`
/// - No blocking operations
pub trait AudioEffect: Send {
    /// Process interleaved stereo samples (L, R, L, R, ...)
    fn process(&mut self, buffer: &mut [f32], sample_rate: u32);

    /// Clear filter history (on seek or track change)
    fn reset(&mut self);

    fn name(&self) -> &str;
}
