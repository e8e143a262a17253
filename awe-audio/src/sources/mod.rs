//! Playable sources
//!
//! A [`Source`] renders itself into a caller-owned stereo buffer. Sources are
//! shared as `Arc<dyn Source>` between the thread that builds the mix and the
//! thread that renders it, so every method takes `&self` and implementors
//! guard their own state.

mod sample;
mod sampler;

pub use sample::Sample;
pub use sampler::{Sampler, DEFAULT_CHUNK_SIZE};

use crate::buffer::SampleBuffer;
use crate::config::RenderConfig;

/// Playback contract shared by samples, samplers and tracks
pub trait Source: Send + Sync {
    /// Rewind and resume playback
    fn make_active(&self);

    /// True while the source has something left to play
    fn is_active(&self) -> bool;

    /// Accumulate `config.target_frame_count` frames into `buffer`, starting at
    /// `config.target_frame_offset`
    fn render(&self, buffer: &mut SampleBuffer<f32>, config: &RenderConfig);

    /// Free the audio this source holds. Safe to call more than once.
    fn release(&self);
}

/// Add a stereo frame into frame `index` of `buffer`.
///
/// Mono targets take the left channel. Returns false past the end of the buffer.
#[inline]
pub(crate) fn accumulate_frame(buffer: &mut SampleBuffer<f32>, index: usize, frame: [f32; 2]) -> bool {
    match buffer.frame_mut(index) {
        Some(target) => {
            target[0] += frame[0];
            if let Some(right) = target.get_mut(1) {
                *right += frame[1];
            }
            true
        }
        None => false,
    }
}
