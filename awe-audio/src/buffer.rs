//! Interleaved PCM sample buffers
//!
//! A [`SampleBuffer`] owns a flat run of samples and a fixed channel count.
//! Frame `i` covers elements `[i * C, i * C + C)`. Every accessor is bounds
//! checked and answers silence when asked for something that isn't there, so
//! one bad read can't take down a mix.

use std::f32::consts::PI;
use std::slice::{ChunksExact, ChunksExactMut};

use crate::error::{AweError, Result};

/// Scale applied to negative integer samples
const NEGATIVE_SCALE: f32 = 32768.0;
/// Scale applied to non-negative integer samples
const POSITIVE_SCALE: f32 = 32767.0;

/// Convert a 16-bit sample to float.
///
/// Negative values divide by 32768 and the rest by 32767, so both ends of the
/// integer range land exactly on -1.0 and 1.0.
#[inline]
pub fn to_float(value: i16) -> f32 {
    if value < 0 {
        value as f32 / NEGATIVE_SCALE
    } else {
        value as f32 / POSITIVE_SCALE
    }
}

/// Convert a float sample to 16-bit, clamping out-of-range input.
///
/// NaN and infinities become 0.
#[inline]
pub fn to_int(value: f32) -> i16 {
    if !value.is_finite() {
        return 0;
    }
    let scaled = if value < 0.0 {
        value * NEGATIVE_SCALE
    } else {
        value * POSITIVE_SCALE
    };
    scaled.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Element type of a [`SampleBuffer`]
pub trait PcmSample: Copy + Default + PartialEq + Send + Sync + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl PcmSample for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl PcmSample for i16 {
    #[inline]
    fn to_f32(self) -> f32 {
        to_float(self)
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        to_int(value)
    }
}

/// Interleaved PCM container with a fixed channel count
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer<T> {
    data: Vec<T>,
    channels: usize,
}

impl<T: PcmSample> SampleBuffer<T> {
    /// Create a silent buffer of `frames` frames
    pub fn new(channels: usize, frames: usize) -> Result<Self> {
        if channels == 0 {
            return Err(AweError::InvalidChannelCount(channels));
        }
        Ok(Self {
            data: vec![T::default(); channels * frames],
            channels,
        })
    }

    /// Wrap already interleaved samples
    pub fn from_interleaved(channels: usize, data: Vec<T>) -> Result<Self> {
        if channels == 0 {
            return Err(AweError::InvalidChannelCount(channels));
        }
        if data.len() % channels != 0 {
            return Err(AweError::BufferLength {
                len: data.len(),
                channels,
            });
        }
        Ok(Self { data, channels })
    }

    /// Number of interleaved channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.channels
    }

    /// Number of individual samples (frames × channels)
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Raw sample at `index`, or silence if out of range
    #[inline]
    pub fn sample(&self, index: usize) -> T {
        self.data.get(index).copied().unwrap_or_default()
    }

    /// Overwrite the sample at `index`. Returns false if out of range.
    #[inline]
    pub fn set_sample(&mut self, index: usize, value: T) -> bool {
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Samples of frame `index`
    #[inline]
    pub fn frame(&self, index: usize) -> Option<&[T]> {
        let start = index.checked_mul(self.channels)?;
        self.data.get(start..start + self.channels)
    }

    /// Mutable samples of frame `index`
    #[inline]
    pub fn frame_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let start = index.checked_mul(self.channels)?;
        self.data.get_mut(start..start + self.channels)
    }

    /// Iterate over frames
    pub fn frames(&self) -> ChunksExact<'_, T> {
        self.data.chunks_exact(self.channels)
    }

    /// Iterate over frames mutably
    pub fn frames_mut(&mut self) -> ChunksExactMut<'_, T> {
        self.data.chunks_exact_mut(self.channels)
    }

    /// Sample of `channel` in frame `frame`, or silence if either is out of range
    #[inline]
    pub fn sample_at(&self, frame: usize, channel: usize) -> T {
        if channel >= self.channels {
            return T::default();
        }
        frame
            .checked_mul(self.channels)
            .and_then(|start| self.data.get(start + channel))
            .copied()
            .unwrap_or_default()
    }

    /// Same as [`sample_at`](Self::sample_at), converted to float
    #[inline]
    pub fn float_at(&self, frame: usize, channel: usize) -> f32 {
        self.sample_at(frame, channel).to_f32()
    }

    /// Reset every sample to silence, keeping the size
    pub fn fill_silence(&mut self) {
        self.data.fill(T::default());
    }

    /// Exchange contents with another buffer
    pub fn swap(&mut self, other: &mut SampleBuffer<T>) {
        std::mem::swap(self, other);
    }

    /// Float copy of this buffer
    pub fn to_float_buffer(&self) -> SampleBuffer<f32> {
        SampleBuffer {
            data: self.data.iter().map(|s| s.to_f32()).collect(),
            channels: self.channels,
        }
    }

    /// Read `channel` at a fractional frame position.
    ///
    /// Uses the optimal 4-point, 3rd-order polynomial (z-form) over the frames
    /// `floor(pos) - 1 ..= floor(pos) + 2`. Frames outside the buffer read as
    /// silence.
    pub fn interpolated(&self, position: f64, channel: usize) -> f32 {
        if !position.is_finite() {
            return 0.0;
        }

        let base = position.floor();
        let z = (position - base) as f32 - 0.5;
        let index = base as i64;

        let y = |k: i64| -> f32 {
            if k < 0 {
                0.0
            } else {
                self.float_at(k as usize, channel)
            }
        };

        let ym1 = y(index - 1);
        let y0 = y(index);
        let y1 = y(index + 1);
        let y2 = y(index + 2);

        let even1 = y1 + y0;
        let odd1 = y1 - y0;
        let even2 = y2 + ym1;
        let odd2 = y2 - ym1;

        let c0 = even1 * 0.458_689_7 + even2 * 0.041_314_02;
        let c1 = odd1 * 0.480_680_25 + odd2 * 0.175_779_26;
        let c2 = even1 * -0.246_185_01 + even2 * 0.246_140_27;
        let c3 = odd1 * -0.360_309_25 + odd2 * 0.101_749_86;

        ((c3 * z + c2) * z + c1) * z + c0
    }
}

/// Generate a mono sine tone
///
/// * `wave_freq` - frequency of the tone in Hz
/// * `sample_rate` - sampling rate of the buffer
/// * `seconds` - length of the buffer
/// * `gain` - peak amplitude
pub fn generate_sine<T: PcmSample>(
    wave_freq: f32,
    sample_rate: u32,
    seconds: f32,
    gain: f32,
) -> SampleBuffer<T> {
    let frames = (sample_rate as f32 * seconds.max(0.0)) as usize;
    let data = (0..frames)
        .map(|t| {
            let phase = 2.0 * PI * wave_freq * t as f32 / sample_rate as f32;
            T::from_f32(gain * phase.sin())
        })
        .collect();
    SampleBuffer { data, channels: 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_float_round_trip() {
        for v in i16::MIN..=i16::MAX {
            assert_eq!(to_int(to_float(v)), v, "round trip failed for {}", v);
        }
    }

    #[test]
    fn test_asymmetric_scaling() {
        assert_eq!(to_float(i16::MIN), -1.0);
        assert_eq!(to_float(i16::MAX), 1.0);
        assert_eq!(to_float(-16384), -0.5);
        assert!((to_float(16384) - 16384.0 / 32767.0).abs() < 1e-9);
    }

    #[test]
    fn test_to_int_edge_cases() {
        assert_eq!(to_int(f32::NAN), 0);
        assert_eq!(to_int(f32::INFINITY), 0);
        assert_eq!(to_int(2.0), 32767);
        assert_eq!(to_int(-2.0), -32768);
        assert_eq!(to_int(0.0), 0);
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(
            SampleBuffer::<f32>::new(0, 16),
            Err(AweError::InvalidChannelCount(0))
        );
        assert_eq!(
            SampleBuffer::from_interleaved(2, vec![0.0f32; 5]),
            Err(AweError::BufferLength { len: 5, channels: 2 })
        );
    }

    #[test]
    fn test_frame_addressing() {
        let buffer = SampleBuffer::from_interleaved(2, vec![1i16, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.sample_count(), 6);
        assert_eq!(buffer.frame(1), Some(&[3i16, 4][..]));
        assert_eq!(buffer.sample_at(2, 1), 6);
        assert_eq!(buffer.frames().count(), 3);
    }

    #[test]
    fn test_out_of_range_reads_are_silent() {
        let buffer = SampleBuffer::from_interleaved(2, vec![0.5f32, -0.5]).unwrap();
        assert_eq!(buffer.sample(2), 0.0);
        assert_eq!(buffer.sample_at(1, 0), 0.0);
        assert_eq!(buffer.sample_at(0, 2), 0.0);
        assert_eq!(buffer.sample_at(usize::MAX, 0), 0.0);
        assert!(buffer.frame(1).is_none());
        assert!(buffer.frame(usize::MAX).is_none());
    }

    #[test]
    fn test_set_sample_and_silence() {
        let mut buffer = SampleBuffer::<f32>::new(2, 4).unwrap();
        assert!(buffer.set_sample(3, 0.25));
        assert!(!buffer.set_sample(8, 0.25));
        assert_eq!(buffer.sample(3), 0.25);

        buffer.fill_silence();
        assert!(buffer.as_slice().iter().all(|&s| s == 0.0));
        assert_eq!(buffer.frame_count(), 4);
    }

    #[test]
    fn test_swap() {
        let mut a = SampleBuffer::from_interleaved(2, vec![1.0f32, 1.0]).unwrap();
        let mut b = SampleBuffer::from_interleaved(2, vec![2.0f32, 2.0]).unwrap();
        a.swap(&mut b);
        assert_eq!(a.sample(0), 2.0);
        assert_eq!(b.sample(0), 1.0);
    }

    #[test]
    fn test_interpolation_of_constant_signal() {
        let buffer = SampleBuffer::from_interleaved(1, vec![0.5f32; 16]).unwrap();
        for pos in [2.0, 2.25, 5.5, 7.75] {
            let value = buffer.interpolated(pos, 0);
            assert!((value - 0.5).abs() < 1e-3, "pos {} gave {}", pos, value);
        }
    }

    #[test]
    fn test_interpolation_tracks_ramp() {
        let ramp: Vec<f32> = (0..32).map(|i| i as f32 * 0.01).collect();
        let buffer = SampleBuffer::from_interleaved(1, ramp).unwrap();
        let value = buffer.interpolated(10.5, 0);
        assert!((value - 0.105).abs() < 2e-3, "got {}", value);
    }

    #[test]
    fn test_interpolation_outside_bounds() {
        let buffer = SampleBuffer::from_interleaved(1, vec![1.0f32; 4]).unwrap();
        assert_eq!(buffer.interpolated(100.0, 0), 0.0);
        assert_eq!(buffer.interpolated(-10.0, 0), 0.0);
        assert_eq!(buffer.interpolated(f64::NAN, 0), 0.0);
    }

    #[test]
    fn test_generate_sine() {
        let sine: SampleBuffer<f32> = generate_sine(1000.0, 48000, 0.1, 0.5);
        assert_eq!(sine.channels(), 1);
        assert_eq!(sine.frame_count(), 4800);
        let peak = sine.as_slice().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01);

        let ints: SampleBuffer<i16> = generate_sine(1000.0, 48000, 0.01, 1.0);
        assert!(ints.as_slice().iter().any(|&s| s > 32000));
    }
}
