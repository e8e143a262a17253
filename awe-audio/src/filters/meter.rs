//! Peak and RMS meter
//!
//! Pass-through filter that measures each buffer it sees. Readings are held
//! with a per-buffer decay: 0.0 shows only the latest buffer, values close to
//! 1.0 give slow, smooth meters.

use super::Filter;
use crate::buffer::SampleBuffer;

/// Per-channel levels, linear scale
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterReading {
    /// Peak absolute value `[left, right]`
    pub peak: [f32; 2],
    /// Running RMS `[left, right]`
    pub rms: [f32; 2],
}

impl MeterReading {
    /// Peak in dBFS
    pub fn peak_db(&self) -> [f32; 2] {
        self.peak.map(to_db)
    }

    /// RMS in dBFS
    pub fn rms_db(&self) -> [f32; 2] {
        self.rms.map(to_db)
    }
}

fn to_db(level: f32) -> f32 {
    if level > 0.0 {
        20.0 * level.log10()
    } else {
        f32::NEG_INFINITY
    }
}

/// Stereo peak/RMS meter
#[derive(Debug, Clone)]
pub struct Meter {
    decay: f32,
    peak: [f32; 2],
    mean_square: [f32; 2],
}

impl Meter {
    /// Create a meter with a per-buffer decay factor (clamped to 0.0..1.0)
    pub fn new(decay: f32) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
            peak: [0.0; 2],
            mean_square: [0.0; 2],
        }
    }

    pub fn reading(&self) -> MeterReading {
        MeterReading {
            peak: self.peak,
            rms: self.mean_square.map(f32::sqrt),
        }
    }

    pub fn peak(&self) -> [f32; 2] {
        self.peak
    }

    pub fn rms(&self) -> [f32; 2] {
        self.reading().rms
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Filter for Meter {
    fn reset_state(&mut self) {
        self.peak = [0.0; 2];
        self.mean_square = [0.0; 2];
    }

    fn apply(&mut self, buffer: &mut SampleBuffer<f32>) {
        let frames = buffer.frame_count();
        if frames == 0 {
            return;
        }

        let mut peak = [0.0f32; 2];
        let mut sum = [0.0f32; 2];
        for frame in buffer.frames() {
            let l = frame[0];
            let r = if frame.len() > 1 { frame[1] } else { l };
            peak[0] = peak[0].max(l.abs());
            peak[1] = peak[1].max(r.abs());
            sum[0] += l * l;
            sum[1] += r * r;
        }

        for ch in 0..2 {
            let block_ms = sum[ch] / frames as f32;
            self.peak[ch] = (self.peak[ch] * self.decay).max(peak[ch]);
            self.mean_square[ch] =
                self.mean_square[ch] * self.decay + block_ms * (1.0 - self.decay);
        }
    }

    fn name(&self) -> &'static str {
        "Meter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave_levels() {
        let mut meter = Meter::default();
        let data: Vec<f32> = (0..256)
            .flat_map(|i| if i % 2 == 0 { [0.5, -0.25] } else { [-0.5, 0.25] })
            .collect();
        let mut buffer = SampleBuffer::from_interleaved(2, data).unwrap();
        let before = buffer.clone();
        meter.apply(&mut buffer);

        // Pass-through
        assert_eq!(buffer, before);

        let reading = meter.reading();
        assert!((reading.peak[0] - 0.5).abs() < 1e-6);
        assert!((reading.peak[1] - 0.25).abs() < 1e-6);
        assert!((reading.rms[0] - 0.5).abs() < 1e-5);
        assert!((reading.rms[1] - 0.25).abs() < 1e-5);
        assert!((reading.peak_db()[0] + 6.0206).abs() < 0.01);
    }

    #[test]
    fn test_peak_decays() {
        let mut meter = Meter::new(0.5);
        let mut loud = SampleBuffer::from_interleaved(2, vec![1.0; 16]).unwrap();
        let mut quiet = SampleBuffer::<f32>::new(2, 8).unwrap();

        meter.apply(&mut loud);
        assert_eq!(meter.peak(), [1.0, 1.0]);

        meter.apply(&mut quiet);
        assert_eq!(meter.peak(), [0.5, 0.5]);
        meter.apply(&mut quiet);
        assert_eq!(meter.peak(), [0.25, 0.25]);
    }

    #[test]
    fn test_mono_feeds_both_channels() {
        let mut meter = Meter::default();
        let mut buffer = SampleBuffer::from_interleaved(1, vec![0.75f32; 10]).unwrap();
        meter.apply(&mut buffer);
        assert_eq!(meter.peak(), [0.75, 0.75]);
    }

    #[test]
    fn test_silence_reads_negative_infinity() {
        let meter = Meter::default();
        assert_eq!(meter.reading().rms_db(), [f32::NEG_INFINITY; 2]);
    }
}
