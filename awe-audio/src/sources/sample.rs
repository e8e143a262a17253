//! Sample player - a decoded PCM buffer walked by a loop sequencer

use parking_lot::Mutex;

use super::{accumulate_frame, Source};
use crate::buffer::SampleBuffer;
use crate::config::{RenderConfig, RenderQuality};
use crate::error::{AweError, Result};
use crate::filters::{Mixer, PanLaw};
use crate::looping::{Loop, LoopMode};

/// Everything that changes while a sample plays
struct SampleState {
    /// Decoded audio, `None` until decoding completes or after release
    buffer: Option<SampleBuffer<i16>>,
    /// Re-normalization factor (>= 1.0)
    peak: f32,
    /// Sample rate of the decoded audio
    sample_rate: u32,
    name: String,
    mixer: Mixer,
    /// Playback speed (1.0 = original)
    speed: f64,
    looping: Loop,
}

/// A playable sound asset
///
/// The decoded buffer is assigned once, usually from a decoder thread, while
/// the application tweaks gain and position and the mixing thread renders.
/// All of it goes through one lock.
pub struct Sample {
    state: Mutex<SampleState>,
}

impl Sample {
    /// Create a sample with no audio yet
    pub fn new(name: impl Into<String>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AweError::InvalidSampleRate);
        }
        Ok(Self {
            state: Mutex::new(SampleState {
                buffer: None,
                peak: 1.0,
                sample_rate,
                name: name.into(),
                mixer: Mixer::default(),
                speed: 1.0,
                looping: Loop::default(),
            }),
        })
    }

    /// Create a sample from already decoded audio
    pub fn with_buffer(
        name: impl Into<String>,
        buffer: SampleBuffer<i16>,
        sample_rate: u32,
        peak: f32,
    ) -> Result<Self> {
        let sample = Self::new(name, sample_rate)?;
        sample.set_buffer(buffer, peak)?;
        Ok(sample)
    }

    /// Hand over decoded audio.
    ///
    /// Only mono and stereo audio is accepted. `peak` below 1.0 (or not finite)
    /// counts as 1.0. The loop is rebuilt over the whole buffer, keeping its
    /// mode, and playback is armed.
    pub fn set_buffer(&self, buffer: SampleBuffer<i16>, peak: f32) -> Result<()> {
        let channels = buffer.channels();
        if channels != 1 && channels != 2 {
            return Err(AweError::InvalidChannelCount(channels));
        }

        let mut state = self.state.lock();
        if state.buffer.is_some() {
            return Err(AweError::BufferAlreadyAssigned);
        }

        let frames = buffer.frame_count();
        state.peak = if peak.is_finite() && peak >= 1.0 {
            peak
        } else {
            1.0
        };
        state.looping = Loop::new(0.0, frames as f64, state.looping.mode);
        state.looping.paused = frames == 0;
        state.buffer = Some(buffer);

        tracing::debug!(
            name = %state.name,
            frames,
            channels,
            peak = state.peak,
            "sample buffer assigned"
        );
        Ok(())
    }

    pub fn has_buffer(&self) -> bool {
        self.state.lock().buffer.is_some()
    }

    /// Run `f` against the decoded buffer while holding the lock
    pub fn read_buffer<R>(&self, f: impl FnOnce(Option<&SampleBuffer<i16>>) -> R) -> R {
        f(self.state.lock().buffer.as_ref())
    }

    pub fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.state.lock().name = name.into();
    }

    pub fn sample_rate(&self) -> u32 {
        self.state.lock().sample_rate
    }

    pub fn peak(&self) -> f32 {
        self.state.lock().peak
    }

    pub fn channels(&self) -> usize {
        self.state
            .lock()
            .buffer
            .as_ref()
            .map_or(0, SampleBuffer::channels)
    }

    pub fn frame_count(&self) -> usize {
        self.state
            .lock()
            .buffer
            .as_ref()
            .map_or(0, SampleBuffer::frame_count)
    }

    /// Length of the decoded audio in seconds
    pub fn play_length(&self) -> f64 {
        let state = self.state.lock();
        state.buffer.as_ref().map_or(0.0, |b| {
            b.frame_count() as f64 / state.sample_rate as f64
        })
    }

    /// Peak-compensated stereo frame at `index`
    pub fn frame(&self, index: usize) -> Option<[f32; 2]> {
        let state = self.state.lock();
        let buffer = state.buffer.as_ref()?;
        if index >= buffer.frame_count() {
            return None;
        }
        let left = buffer.float_at(index, 0);
        let right = if buffer.channels() > 1 {
            buffer.float_at(index, 1)
        } else {
            left
        };
        Some([left * state.peak, right * state.peak])
    }

    pub fn mixer(&self) -> Mixer {
        self.state.lock().mixer.clone()
    }

    pub fn set_volume(&self, volume: f32) {
        self.state.lock().mixer.set_volume(volume);
    }

    pub fn set_pan(&self, pan: f32) {
        self.state.lock().mixer.set_pan(pan);
    }

    pub fn set_pan_law(&self, law: PanLaw) {
        self.state.lock().mixer.set_law(law);
    }

    pub fn speed(&self) -> f64 {
        self.state.lock().speed
    }

    /// Set playback speed (1.0 = original). Negative or non-finite values are ignored.
    pub fn set_speed(&self, speed: f64) {
        if speed.is_finite() && speed >= 0.0 {
            self.state.lock().speed = speed;
        }
    }

    /// Snapshot of the loop sequencer
    pub fn loop_state(&self) -> Loop {
        self.state.lock().looping
    }

    pub fn set_loop_mode(&self, mode: LoopMode) {
        self.state.lock().looping.mode = mode;
    }

    /// Set the loop mode from its packed form
    pub fn set_loop_mode_bits(&self, bits: u8) -> Result<()> {
        self.state.lock().looping.set_mode_bits(bits)
    }

    /// Restrict playback to `begin..end` frames, clamped to the buffer
    pub fn set_loop_bounds(&self, begin: f64, end: f64) {
        let mut state = self.state.lock();
        let frames = state.buffer.as_ref().map_or(0, SampleBuffer::frame_count) as f64;
        let begin = begin.clamp(0.0, frames);
        let end = end.clamp(0.0, frames);
        let paused = state.looping.paused;
        state.looping = Loop::new(begin, end, state.looping.mode);
        state.looping.paused = paused;
    }

    pub fn pause(&self) {
        self.state.lock().looping.paused = true;
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if state.buffer.is_some() {
            state.looping.paused = false;
        }
    }

    /// Jump to frame `position` (clamped to the loop)
    pub fn seek(&self, position: f64) {
        self.state.lock().looping.seek(position);
    }

    /// Move forward past silent frames from the current position.
    ///
    /// Returns how many frames were skipped.
    pub fn skip_silence(&self) -> usize {
        let mut state = self.state.lock();
        let state = &mut *state;
        let Some(buffer) = state.buffer.as_ref() else {
            return 0;
        };

        let start = state.looping.now_index();
        let end = state.looping.end_index().min(buffer.frame_count());
        let skipped = (start..end)
            .take_while(|&i| {
                buffer
                    .frame(i)
                    .is_some_and(|frame| frame.iter().all(|&s| s == 0))
            })
            .count();

        state.looping.seek((start + skipped) as f64);
        skipped
    }
}

impl Source for Sample {
    fn make_active(&self) {
        let mut state = self.state.lock();
        if state.buffer.is_some() {
            state.looping.reset();
        }
    }

    fn is_active(&self) -> bool {
        let state = self.state.lock();
        state.buffer.is_some() && !state.looping.paused
    }

    fn render(&self, buffer: &mut SampleBuffer<f32>, config: &RenderConfig) {
        if config.quality == RenderQuality::Skip || config.target_sample_rate == 0 {
            return;
        }

        let mut guard = self.state.lock();
        let SampleState {
            buffer: Some(source),
            peak,
            sample_rate,
            mixer,
            speed,
            looping,
            ..
        } = &mut *guard
        else {
            return;
        };

        let move_rate = *sample_rate as f64 / config.target_sample_rate as f64 * *speed;

        if config.quality == RenderQuality::Mute {
            looping.advance(config.target_frame_count as f64 * move_rate);
            return;
        }
        if looping.paused {
            return;
        }

        let interpolate = matches!(config.quality, RenderQuality::Best | RenderQuality::Default)
            && move_rate != 1.0;
        let gain = if config.quality == RenderQuality::Fast {
            [1.0, 1.0]
        } else {
            let [l, r] = mixer.gain();
            [l * *peak, r * *peak]
        };
        let stereo = source.channels() > 1;
        let end = config.end_frame().min(buffer.frame_count());

        for i in config.target_frame_offset..end {
            let (left, right) = if interpolate {
                let position = looping.now;
                let left = source.interpolated(position, 0);
                let right = if stereo {
                    source.interpolated(position, 1)
                } else {
                    left
                };
                (left, right)
            } else {
                let index = looping.current_index();
                let left = source.float_at(index, 0);
                let right = if stereo {
                    source.float_at(index, 1)
                } else {
                    left
                };
                (left, right)
            };

            accumulate_frame(buffer, i, [left * gain[0], right * gain[1]]);

            if looping.advance(move_rate) {
                break;
            }
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if state.buffer.take().is_some() {
            state.looping = Loop {
                mode: state.looping.mode,
                ..Loop::default()
            };
            tracing::debug!(name = %state.name, "sample released");
        }
    }
}
