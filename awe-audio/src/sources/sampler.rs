//! Sampler - plays a [`Sample`] at a fixed output rate through rubato
//!
//! Unlike the sample's own player, which walks its buffer with a loop
//! sequencer and cubic interpolation, the sampler streams the whole buffer
//! once through a band-limited FFT resampler. Matching rates skip the
//! resampler and copy frames directly.

use std::sync::Arc;

use parking_lot::Mutex;
use rubato::{FftFixedOut, Resampler};

use super::{accumulate_frame, Sample, Source};
use crate::buffer::SampleBuffer;
use crate::config::{RenderConfig, RenderQuality};
use crate::error::{AweError, Result};

/// Resampler output chunk, in frames
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Sub-chunks per FFT chunk
const SUB_CHUNKS: usize = 2;

/// FFT resampler and its scratch buffers, sized once
struct Converter {
    resampler: FftFixedOut<f32>,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    /// Frames in `output` from the last chunk
    available: usize,
    /// Next frame of `output` to hand out
    cursor: usize,
    /// Leading output frames still to discard (filter delay)
    delay: usize,
}

impl Converter {
    fn new(input_rate: u32, output_rate: u32, chunk_size: usize, channels: usize) -> Result<Self> {
        let resampler = FftFixedOut::<f32>::new(
            input_rate as usize,
            output_rate as usize,
            chunk_size,
            SUB_CHUNKS,
            channels,
        )
        .map_err(|e| AweError::Resampler(e.to_string()))?;

        let input = vec![vec![0.0; resampler.input_frames_max()]; channels];
        let output = vec![vec![0.0; resampler.output_frames_max()]; channels];
        let delay = resampler.output_delay();

        Ok(Self {
            resampler,
            input,
            output,
            available: 0,
            cursor: 0,
            delay,
        })
    }

    /// Feed the next input chunk, zero-padded past the end of `source`
    fn refill(&mut self, source: &SampleBuffer<i16>, read: &mut usize) -> Result<()> {
        let needed = self.resampler.input_frames_next();
        for (channel, input) in self.input.iter_mut().enumerate() {
            for (k, slot) in input[..needed].iter_mut().enumerate() {
                *slot = source.float_at(*read + k, channel);
            }
        }
        *read = (*read + needed).min(source.frame_count());

        let (_, produced) = self
            .resampler
            .process_into_buffer(self.input.as_slice(), self.output.as_mut_slice(), None)
            .map_err(|e| AweError::Resampler(e.to_string()))?;

        let skip = self.delay.min(produced);
        self.delay -= skip;
        self.available = produced;
        self.cursor = skip;
        Ok(())
    }
}

/// Playback progress through the sample
struct Stream {
    channels: usize,
    /// Source frames consumed
    read: usize,
    /// Output frames emitted
    written: usize,
    /// Total output frames for the whole sample
    expected: usize,
    /// `None` when input and output rates match
    converter: Option<Converter>,
}

impl Stream {
    /// Build a stream from the start of `sample`; `None` if it has no audio yet
    fn open(sample: &Sample, output_rate: u32, chunk_size: usize) -> Result<Option<Self>> {
        let channels = sample.channels();
        if channels == 0 {
            return Ok(None);
        }
        let frames = sample.frame_count();
        let input_rate = sample.sample_rate();

        let converter = if input_rate == output_rate {
            None
        } else {
            tracing::debug!(
                name = %sample.name(),
                input_rate,
                output_rate,
                chunk_size,
                "creating resampler"
            );
            Some(Converter::new(input_rate, output_rate, chunk_size, channels)?)
        };

        let expected = (frames as u64 * output_rate as u64).div_ceil(input_rate as u64) as usize;

        Ok(Some(Self {
            channels,
            read: 0,
            written: 0,
            expected,
            converter,
        }))
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.expected.saturating_sub(self.written)
    }

    /// Emit up to `frames` frames into `buffer` from `offset`, or just consume
    /// them when `buffer` is `None`
    fn run(
        &mut self,
        source: &SampleBuffer<i16>,
        mut buffer: Option<&mut SampleBuffer<f32>>,
        offset: usize,
        frames: usize,
        gain: [f32; 2],
    ) -> Result<()> {
        let stereo = self.channels > 1;

        let Some(converter) = self.converter.as_mut() else {
            let take = frames.min(self.remaining());
            if let Some(buffer) = buffer {
                for k in 0..take {
                    let i = self.read + k;
                    let left = source.float_at(i, 0);
                    let right = if stereo { source.float_at(i, 1) } else { left };
                    accumulate_frame(buffer, offset + k, [left * gain[0], right * gain[1]]);
                }
            }
            self.read += take;
            self.written += take;
            return Ok(());
        };

        let mut done = 0;
        while done < frames && self.written < self.expected {
            if converter.cursor >= converter.available {
                converter.refill(source, &mut self.read)?;
                continue;
            }

            let take = (converter.available - converter.cursor)
                .min(frames - done)
                .min(self.expected - self.written);

            if let Some(buffer) = buffer.as_deref_mut() {
                for k in 0..take {
                    let i = converter.cursor + k;
                    let left = converter.output[0][i];
                    let right = if stereo { converter.output[1][i] } else { left };
                    accumulate_frame(buffer, offset + done + k, [left * gain[0], right * gain[1]]);
                }
            }

            converter.cursor += take;
            done += take;
            self.written += take;
        }
        Ok(())
    }
}

struct SamplerState {
    gain: [f32; 2],
    stream: Option<Stream>,
}

/// Resampling player for a shared [`Sample`]
///
/// Renders at its own output rate; the target rate in the render config is
/// not consulted.
pub struct Sampler {
    sample: Arc<Sample>,
    output_rate: u32,
    chunk_size: usize,
    state: Mutex<SamplerState>,
}

impl Sampler {
    /// Sampler with unity channel gains and the default chunk size
    pub fn new(sample: Arc<Sample>, output_rate: u32) -> Result<Self> {
        Self::with_options(sample, output_rate, DEFAULT_CHUNK_SIZE, [1.0, 1.0])
    }

    pub fn with_options(
        sample: Arc<Sample>,
        output_rate: u32,
        chunk_size: usize,
        gain: [f32; 2],
    ) -> Result<Self> {
        if output_rate == 0 {
            return Err(AweError::InvalidSampleRate);
        }
        if chunk_size == 0 {
            return Err(AweError::InvalidFrameCount);
        }

        let stream = Stream::open(&sample, output_rate, chunk_size)?;
        Ok(Self {
            sample,
            output_rate,
            chunk_size,
            state: Mutex::new(SamplerState { gain, stream }),
        })
    }

    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// `[left, right]` channel gains
    pub fn gain(&self) -> [f32; 2] {
        self.state.lock().gain
    }

    pub fn set_gain(&self, gain: [f32; 2]) {
        self.state.lock().gain = gain;
    }

    /// Output frames emitted since the last restart
    pub fn frames_written(&self) -> usize {
        self.state.lock().stream.as_ref().map_or(0, |s| s.written)
    }

    /// Output length of the whole sample at the output rate
    pub fn expected_frames(&self) -> usize {
        self.state.lock().stream.as_ref().map_or(0, |s| s.expected)
    }
}

impl Source for Sampler {
    fn make_active(&self) {
        let stream = match Stream::open(&self.sample, self.output_rate, self.chunk_size) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "sampler restart failed");
                None
            }
        };
        self.state.lock().stream = stream;
    }

    fn is_active(&self) -> bool {
        self.state
            .lock()
            .stream
            .as_ref()
            .is_some_and(|s| s.remaining() > 0)
    }

    fn render(&self, buffer: &mut SampleBuffer<f32>, config: &RenderConfig) {
        if config.quality == RenderQuality::Skip {
            return;
        }

        let peak = self.sample.peak();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(stream) = state.stream.as_mut() else {
            return;
        };
        let gain = [state.gain[0] * peak, state.gain[1] * peak];

        let offset = config.target_frame_offset;
        let result = self.sample.read_buffer(|source| {
            let Some(source) = source else {
                return Ok(());
            };
            if config.quality == RenderQuality::Mute {
                stream.run(source, None, offset, config.target_frame_count, gain)
            } else {
                let frames = config
                    .end_frame()
                    .min(buffer.frame_count())
                    .saturating_sub(offset);
                stream.run(source, Some(&mut *buffer), offset, frames, gain)
            }
        });

        if let Err(e) = result {
            tracing::warn!(name = %self.sample.name(), error = %e, "sampler render failed");
        }
    }

    fn release(&self) {
        if self.state.lock().stream.take().is_some() {
            tracing::debug!(name = %self.sample.name(), "sampler released");
        }
    }
}
