//! Mixing engine
//!
//! The engine owns the master [`Track`] and the producer side of a lock-free
//! FIFO of interleaved stereo samples. A mixing thread calls [`Engine::update`]
//! in a loop; the audio callback drains the FIFO through [`EngineOutput::fill`].
//!
//! When the callback finds the FIFO short it zero-fills and reports an
//! underrun. The next update skips the master track once per reported
//! underrun, so playback positions stay in step with wall-clock time. At most
//! `buffer_periods` skips run per update; older underruns are forgotten.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::buffer::SampleBuffer;
use crate::config::{EngineConfig, RenderConfig};
use crate::error::Result;
use crate::sources::Source;
use crate::track::Track;

/// Stereo output channel count
const OUTPUT_CHANNELS: usize = 2;

/// Mixing side of the engine
pub struct Engine {
    config: EngineConfig,
    master: Arc<Track>,
    producer: HeapProd<f32>,
    // Pre-allocated render target, one period long
    scratch: SampleBuffer<f32>,
    underruns: Arc<AtomicUsize>,
    handled_underruns: usize,
}

/// Device side of the engine, moved into the audio callback
pub struct EngineOutput {
    consumer: HeapCons<f32>,
    underruns: Arc<AtomicUsize>,
}

impl Engine {
    /// Build the master track and the FIFO between mixer and device
    pub fn new(config: EngineConfig) -> Result<(Self, EngineOutput)> {
        config.validate()?;

        let master = Arc::new(Track::with_config(
            "master",
            RenderConfig::new(config.sample_rate, config.frame_count),
        )?);
        let scratch = SampleBuffer::new(OUTPUT_CHANNELS, config.frame_count)?;
        let (producer, consumer) = HeapRb::<f32>::new(config.fifo_capacity()).split();
        let underruns = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            sample_rate = config.sample_rate,
            frame_count = config.frame_count,
            periods = config.buffer_periods,
            period_ms = config.period_ms(),
            "engine created"
        );

        Ok((
            Self {
                config,
                master,
                producer,
                scratch,
                underruns: Arc::clone(&underruns),
                handled_underruns: 0,
            },
            EngineOutput {
                consumer,
                underruns,
            },
        ))
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The track everything audible gets attached to
    pub fn master(&self) -> Arc<Track> {
        Arc::clone(&self.master)
    }

    /// Interleaved samples waiting for the device
    pub fn buffered(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Underruns reported by the device so far
    pub fn underruns(&self) -> usize {
        self.underruns.load(Ordering::Acquire)
    }

    /// Catch up on underruns, then render one period if the FIFO has room.
    ///
    /// Returns true when a period was pushed.
    pub fn update(&mut self) -> bool {
        let reported = self.underruns.load(Ordering::Acquire);
        let missed = reported.wrapping_sub(self.handled_underruns);
        if missed > 0 {
            let skips = missed.min(self.config.buffer_periods);
            tracing::debug!(missed, skips, "skipping master track after underrun");
            for _ in 0..skips {
                self.master.skip();
            }
            self.handled_underruns = reported;
        }

        let period = self.scratch.sample_count();
        if self.producer.vacant_len() < period {
            return false;
        }

        self.scratch.fill_silence();
        let render = RenderConfig::new(self.config.sample_rate, self.config.frame_count);
        self.master.render(&mut self.scratch, &render);

        let pushed = self.producer.push_slice(self.scratch.as_slice());
        debug_assert_eq!(pushed, period);
        true
    }
}

impl EngineOutput {
    /// Copy buffered samples into `out`, zero-filling whatever is missing.
    ///
    /// Returns the number of samples that came from the FIFO. A short read
    /// counts as one underrun.
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let read = self.consumer.pop_slice(out);
        if read < out.len() {
            out[read..].fill(0.0);
            self.underruns.fetch_add(1, Ordering::AcqRel);
        }
        read
    }

    /// Interleaved samples ready to be read
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn underruns(&self) -> usize {
        self.underruns.load(Ordering::Acquire)
    }
}
