//! 3-band EQ
//!
//! Splits the signal with an independent low-pass and high-pass pair; the mid
//! band is whatever both leave behind. With all gains at 1.0 the bands sum back
//! to the input exactly.

use super::{Filter, Iir, IirCoefficients};
use crate::buffer::SampleBuffer;

/// Default low/mid crossover (Hz)
pub const DEFAULT_LOW_FREQ: f64 = 880.0;
/// Default mid/high crossover (Hz)
pub const DEFAULT_HIGH_FREQ: f64 = 5000.0;

/// Three-band equalizer with linear band gains
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    sample_rate: f64,
    low_freq: f64,
    high_freq: f64,
    low_gain: f64,
    mid_gain: f64,
    high_gain: f64,
    lpf: Iir,
    hpf: Iir,
}

impl ThreeBandEq {
    /// EQ with the default crossovers and unity gains
    pub fn new(sample_rate: f64) -> Self {
        Self::with_crossovers(sample_rate, DEFAULT_LOW_FREQ, DEFAULT_HIGH_FREQ)
    }

    pub fn with_crossovers(sample_rate: f64, low_freq: f64, high_freq: f64) -> Self {
        Self {
            sample_rate,
            low_freq,
            high_freq,
            low_gain: 1.0,
            mid_gain: 1.0,
            high_gain: 1.0,
            lpf: Iir::low_pass(sample_rate, low_freq),
            hpf: Iir::high_pass(sample_rate, high_freq),
        }
    }

    /// Set the three band gains (linear)
    pub fn set_gains(&mut self, low: f64, mid: f64, high: f64) {
        self.low_gain = low;
        self.mid_gain = mid;
        self.high_gain = high;
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.low_gain, self.mid_gain, self.high_gain)
    }

    /// Move the crossovers; filter state is kept
    pub fn set_crossovers(&mut self, low_freq: f64, high_freq: f64) {
        self.low_freq = low_freq;
        self.high_freq = high_freq;
        self.lpf
            .set_coefficients(IirCoefficients::low_pass(self.sample_rate, low_freq));
        self.hpf
            .set_coefficients(IirCoefficients::high_pass(self.sample_rate, high_freq));
    }

    pub fn crossovers(&self) -> (f64, f64) {
        (self.low_freq, self.high_freq)
    }

    #[inline]
    fn mix(&self, x: f64, low: f64, high: f64) -> f32 {
        let mid = x - (low + high);
        (low * self.low_gain + mid * self.mid_gain + high * self.high_gain) as f32
    }
}

impl Filter for ThreeBandEq {
    fn reset_state(&mut self) {
        self.lpf.reset_state();
        self.hpf.reset_state();
    }

    fn apply(&mut self, buffer: &mut SampleBuffer<f32>) {
        if buffer.channels() == 1 {
            for sample in buffer.as_mut_slice() {
                let x = *sample as f64;
                let low = self.lpf.process_left(x);
                let high = self.hpf.process_left(x);
                *sample = self.mix(x, low, high);
            }
            return;
        }

        for frame in buffer.frames_mut() {
            let l = frame[0] as f64;
            let low = self.lpf.process_left(l);
            let high = self.hpf.process_left(l);
            frame[0] = self.mix(l, low, high);

            let r = frame[1] as f64;
            let low = self.lpf.process_right(r);
            let high = self.hpf.process_right(r);
            frame[1] = self.mix(r, low, high);
        }
    }

    fn name(&self) -> &'static str {
        "3-Band EQ"
    }
}
