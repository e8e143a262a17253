//! Second-order IIR filter (Butterworth low/high-pass)
//!
//! Runs in transposed direct form II with `f64` state. Delay-line values under
//! 1e-12 (about -240 dB) are flushed to zero to keep denormals out of the
//! feedback path.

use std::f64::consts::{PI, SQRT_2};

use super::Filter;
use crate::buffer::SampleBuffer;

/// Flush threshold for the delay line
const DENORMAL_FLOOR: f64 = 1.0e-12;

/// Normalized biquad coefficients (`a0` is implicitly 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IirCoefficients {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Default for IirCoefficients {
    /// Pass-through
    fn default() -> Self {
        Self {
            b: [1.0, 0.0, 0.0],
            a: [1.0, 0.0, 0.0],
        }
    }
}

impl IirCoefficients {
    /// Butterworth low-pass at `cutoff` Hz
    pub fn low_pass(sample_rate: f64, cutoff: f64) -> Self {
        let n = 1.0 / (PI * cutoff / sample_rate).tan();
        let c = 1.0 / (1.0 + SQRT_2 * n + n * n);

        Self {
            b: [c, 2.0 * c, c],
            a: [1.0, 2.0 * c * (1.0 - n * n), c * (1.0 - SQRT_2 * n + n * n)],
        }
        .sanitized()
    }

    /// Butterworth high-pass at `cutoff` Hz
    pub fn high_pass(sample_rate: f64, cutoff: f64) -> Self {
        let n = (PI * cutoff / sample_rate).tan();
        let c = 1.0 / (1.0 + SQRT_2 * n + n * n);

        Self {
            b: [c, -2.0 * c, c],
            a: [1.0, 2.0 * c * (n * n - 1.0), c * (1.0 - SQRT_2 * n + n * n)],
        }
        .sanitized()
    }

    /// Degenerate designs (zero or Nyquist cutoff) produce NaN; zero them
    fn sanitized(mut self) -> Self {
        for k in self.b.iter_mut().chain(self.a.iter_mut().skip(1)) {
            if k.is_nan() {
                *k = 0.0;
            }
        }
        self
    }
}

/// Delay line of one channel
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct IirState {
    z: [f64; 2],
}

impl IirState {
    #[inline]
    fn process(&mut self, x: f64, k: &IirCoefficients) -> f64 {
        let y = x * k.b[0] + self.z[0];
        self.z[0] = x * k.b[1] - y * k.a[1] + self.z[1];
        self.z[1] = x * k.b[2] - y * k.a[2];

        for z in self.z.iter_mut() {
            if z.abs() < DENORMAL_FLOOR {
                *z = 0.0;
            }
        }

        y
    }

    fn reset(&mut self) {
        self.z = [0.0; 2];
    }
}

/// Stereo biquad filter
#[derive(Debug, Clone, PartialEq)]
pub struct Iir {
    coeffs: IirCoefficients,
    left: IirState,
    right: IirState,
}

impl Iir {
    pub fn new(coeffs: IirCoefficients) -> Self {
        Self {
            coeffs,
            left: IirState::default(),
            right: IirState::default(),
        }
    }

    pub fn low_pass(sample_rate: f64, cutoff: f64) -> Self {
        Self::new(IirCoefficients::low_pass(sample_rate, cutoff))
    }

    pub fn high_pass(sample_rate: f64, cutoff: f64) -> Self {
        Self::new(IirCoefficients::high_pass(sample_rate, cutoff))
    }

    pub fn coefficients(&self) -> IirCoefficients {
        self.coeffs
    }

    /// Swap coefficients, keeping the delay lines
    pub fn set_coefficients(&mut self, coeffs: IirCoefficients) {
        self.coeffs = coeffs;
    }

    /// Filter one left-channel sample
    #[inline]
    pub fn process_left(&mut self, x: f64) -> f64 {
        self.left.process(x, &self.coeffs)
    }

    /// Filter one right-channel sample
    #[inline]
    pub fn process_right(&mut self, x: f64) -> f64 {
        self.right.process(x, &self.coeffs)
    }
}

impl Filter for Iir {
    fn reset_state(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn apply(&mut self, buffer: &mut SampleBuffer<f32>) {
        if buffer.channels() == 1 {
            for sample in buffer.as_mut_slice() {
                *sample = self.process_left(*sample as f64) as f32;
            }
            return;
        }

        for frame in buffer.frames_mut() {
            frame[0] = self.process_left(frame[0] as f64) as f32;
            frame[1] = self.process_right(frame[1] as f64) as f32;
        }
    }

    fn name(&self) -> &'static str {
        "IIR"
    }
}
