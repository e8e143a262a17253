//! Render and engine configuration

use crate::error::{AweError, Result};

/// Render quality requested by whoever drives a render call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderQuality {
    /// Whatever the renderer does best (same as `Best` for sample players)
    #[default]
    Default,
    /// Raw samples, no gain/pan, no peak compensation. Preview quality.
    Fast,
    /// Gain/pan and peak compensation, nearest-frame reads
    Medium,
    /// Gain/pan, peak compensation and cubic interpolation when rates differ
    Best,
    /// Write nothing but keep playback positions moving (underrun catch-up)
    Mute,
    /// Write nothing and change nothing
    Skip,
}

impl RenderQuality {
    /// True for the two qualities that never write into the target buffer
    #[inline]
    pub fn is_silent(self) -> bool {
        matches!(self, RenderQuality::Mute | RenderQuality::Skip)
    }
}

/// Parameters threaded through every render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Output sample rate in Hz
    pub target_sample_rate: u32,
    /// Number of frames to render
    pub target_frame_count: usize,
    /// First frame of the target buffer to render into
    pub target_frame_offset: usize,
    pub quality: RenderQuality,
}

impl RenderConfig {
    pub fn new(target_sample_rate: u32, target_frame_count: usize) -> Self {
        Self {
            target_sample_rate,
            target_frame_count,
            target_frame_offset: 0,
            quality: RenderQuality::Default,
        }
    }

    /// Copy of this config rendering at `quality`
    pub fn with_quality(mut self, quality: RenderQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Copy of this config starting at frame `offset` of the target
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.target_frame_offset = offset;
        self
    }

    /// One past the last frame touched by this render, saturating at `usize::MAX`
    #[inline]
    pub fn end_frame(&self) -> usize {
        self.target_frame_offset.saturating_add(self.target_frame_count)
    }
}

/// Engine setup: output rate, update period and FIFO depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Frames rendered per engine update
    pub frame_count: usize,
    /// FIFO capacity, in update periods
    pub buffer_periods: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            frame_count: 512,
            buffer_periods: 4,
        }
    }
}

impl EngineConfig {
    /// Check the configuration before any buffer gets sized from it
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AweError::InvalidSampleRate);
        }
        if self.frame_count == 0 || self.buffer_periods == 0 {
            return Err(AweError::InvalidFrameCount);
        }
        Ok(())
    }

    /// FIFO capacity in interleaved stereo samples
    pub fn fifo_capacity(&self) -> usize {
        self.frame_count * self.buffer_periods * 2
    }

    /// Duration of one update period in milliseconds
    pub fn period_ms(&self) -> f32 {
        1000.0 * self.frame_count as f32 / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_builders() {
        let config = RenderConfig::new(44100, 256)
            .with_offset(32)
            .with_quality(RenderQuality::Fast);
        assert_eq!(config.target_sample_rate, 44100);
        assert_eq!(config.target_frame_offset, 32);
        assert_eq!(config.end_frame(), 288);
        assert_eq!(config.quality, RenderQuality::Fast);
    }

    #[test]
    fn test_end_frame_saturates() {
        let config = RenderConfig::new(48000, 512).with_offset(usize::MAX - 2);
        assert_eq!(config.end_frame(), usize::MAX);
    }

    #[test]
    fn test_silent_qualities() {
        assert!(RenderQuality::Mute.is_silent());
        assert!(RenderQuality::Skip.is_silent());
        assert!(!RenderQuality::Default.is_silent());
        assert!(!RenderQuality::Fast.is_silent());
    }

    #[test]
    fn test_engine_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let zero_frames = EngineConfig {
            frame_count: 0,
            ..EngineConfig::default()
        };
        assert_eq!(zero_frames.validate(), Err(AweError::InvalidFrameCount));

        let zero_rate = EngineConfig {
            sample_rate: 0,
            ..EngineConfig::default()
        };
        assert_eq!(zero_rate.validate(), Err(AweError::InvalidSampleRate));
    }

    #[test]
    fn test_fifo_capacity() {
        let config = EngineConfig::default();
        assert_eq!(config.fifo_capacity(), 512 * 4 * 2);
        assert!((config.period_ms() - 10.666).abs() < 0.01);
    }
}
