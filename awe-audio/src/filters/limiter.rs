//! Gain-riding limiter
//!
//! Per frame: when the louder channel exceeds the current gain, the gain jumps
//! halfway towards it; the frame is divided by the gain; then the gain relaxes
//! halfway back towards unity. Sustained input above full scale is reduced but
//! not held under 1.0.

use super::Filter;
use crate::buffer::SampleBuffer;

/// Per-frame gain rider
#[derive(Debug, Clone)]
pub struct Limiter {
    enabled: bool,
    gain: f32,
    peak_gain: f32,
}

impl Default for Limiter {
    fn default() -> Self {
        Self {
            enabled: true,
            gain: 1.0,
            peak_gain: 1.0,
        }
    }
}

impl Limiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current gain divisor (1.0 when idle)
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Highest gain divisor applied since the last reset
    pub fn peak_gain(&self) -> f32 {
        self.peak_gain
    }

    /// Gain reduction currently applied, in dB (<= 0)
    pub fn gain_reduction_db(&self) -> f32 {
        -20.0 * self.gain.log10()
    }

    #[inline]
    fn process_frame(&mut self, frame: &mut [f32]) {
        let level = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));

        if level > self.gain {
            self.gain += (level - self.gain) / 2.0;
        }
        if !self.gain.is_finite() {
            self.gain = 1.0;
        }

        for s in frame.iter_mut() {
            *s /= self.gain;
        }

        self.peak_gain = self.peak_gain.max(self.gain);

        if self.gain > 1.0 {
            self.gain -= (self.gain - 1.0) / 2.0;
        }
    }
}

impl Filter for Limiter {
    fn reset_state(&mut self) {
        self.gain = 1.0;
        self.peak_gain = 1.0;
    }

    fn apply(&mut self, buffer: &mut SampleBuffer<f32>) {
        if !self.enabled {
            return;
        }
        for frame in buffer.frames_mut() {
            self.process_frame(frame);
        }
    }

    fn name(&self) -> &'static str {
        "Limiter"
    }
}
