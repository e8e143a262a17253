//! Mixing track - the double-buffered composite source
//!
//! Sources render into the pool; a flip moves the pool into the output and
//! hands back a silent pool. The filter rack then runs over the output, which
//! is what the track contributes to whoever renders it. Tracks are sources
//! themselves, so they nest.
//!
//! Lock order is pool, then output, then the source list or the rack. Every
//! path that takes more than one of them takes them in that order.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::buffer::SampleBuffer;
use crate::config::{RenderConfig, RenderQuality};
use crate::error::{AweError, Result};
use crate::filters::{Filter, FilterHandle, Rack};
use crate::sources::{accumulate_frame, Source};

/// Output channels of every track
const CHANNELS: usize = 2;

/// A mix bus owning its sources' render cycle
pub struct Track {
    name: String,
    config: RenderConfig,
    /// Attached sources, in render order
    sources: Mutex<Vec<Weak<dyn Source>>>,
    /// Mixing buffer the sources render into
    pool: Mutex<SampleBuffer<f32>>,
    /// Last flipped and filtered mix
    output: Mutex<SampleBuffer<f32>>,
    rack: Mutex<Rack>,
}

impl Track {
    /// Create a track rendering `frame_count` frames per cycle at `sample_rate`
    pub fn new(sample_rate: u32, frame_count: usize) -> Result<Self> {
        Self::with_config("track", RenderConfig::new(sample_rate, frame_count))
    }

    /// Create a named track from a full render configuration
    pub fn with_config(name: impl Into<String>, config: RenderConfig) -> Result<Self> {
        if config.target_sample_rate == 0 {
            return Err(AweError::InvalidSampleRate);
        }
        if config.target_frame_count == 0 {
            return Err(AweError::InvalidFrameCount);
        }
        let config = config.with_offset(0);

        Ok(Self {
            name: name.into(),
            config,
            sources: Mutex::new(Vec::new()),
            pool: Mutex::new(SampleBuffer::new(CHANNELS, config.target_frame_count)?),
            output: Mutex::new(SampleBuffer::new(CHANNELS, config.target_frame_count)?),
            rack: Mutex::new(Rack::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RenderConfig {
        self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.target_sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.config.target_frame_count
    }

    /// Buffering delay of one cycle in milliseconds
    pub fn buffer_length_ms(&self) -> f32 {
        1000.0 * self.frame_count() as f32 / self.sample_rate() as f32
    }

    #[inline]
    fn same_source(a: *const dyn Source, b: *const dyn Source) -> bool {
        std::ptr::eq(a as *const u8, b as *const u8)
    }

    /// Add a source to the end of the render order.
    ///
    /// Returns false if it is already attached or is this track.
    pub fn attach(&self, source: &Arc<dyn Source>) -> bool {
        let ptr = Arc::as_ptr(source);
        if std::ptr::eq(ptr as *const u8, self as *const Self as *const u8) {
            tracing::warn!(track = %self.name, "refusing to attach a track to itself");
            return false;
        }

        let mut sources = self.sources.lock();
        sources.retain(|w| w.strong_count() > 0);
        if sources.iter().any(|w| Self::same_source(w.as_ptr(), ptr)) {
            return false;
        }
        sources.push(Arc::downgrade(source));
        tracing::debug!(track = %self.name, count = sources.len(), "source attached");
        true
    }

    /// Remove a source. Returns false if it was not attached.
    pub fn detach(&self, source: &Arc<dyn Source>) -> bool {
        let ptr = Arc::as_ptr(source);
        let mut sources = self.sources.lock();
        let mut removed = false;
        sources.retain(|w| {
            if Self::same_source(w.as_ptr(), ptr) {
                removed = true;
                return false;
            }
            w.strong_count() > 0
        });
        if removed {
            tracing::debug!(track = %self.name, count = sources.len(), "source detached");
        }
        removed
    }

    /// Number of attached sources that are still alive and playing
    pub fn count_active(&self) -> usize {
        self.sources
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| s.is_active())
            .count()
    }

    /// Number of attached sources that are still alive
    pub fn source_count(&self) -> usize {
        self.sources
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Render every live, active source into `pool`
    fn pull_into(&self, pool: &mut SampleBuffer<f32>, config: &RenderConfig) {
        let sources = self.sources.lock();
        for source in sources.iter().filter_map(Weak::upgrade) {
            if source.is_active() {
                source.render(pool, config);
            }
        }
    }

    /// Silence `output` and exchange it with `pool`
    fn flip_buffers(pool: &mut SampleBuffer<f32>, output: &mut SampleBuffer<f32>) {
        output.fill_silence();
        output.swap(pool);
    }

    /// Mix all active sources into the pool
    pub fn pull(&self) {
        let mut pool = self.pool.lock();
        self.pull_into(&mut pool, &self.config);
    }

    /// Advance all active sources by one cycle without producing sound
    pub fn skip(&self) {
        let mut pool = self.pool.lock();
        self.pull_into(&mut pool, &self.config.with_quality(RenderQuality::Mute));
    }

    /// Move the pool into the output and start a silent pool
    pub fn flip(&self) {
        let mut pool = self.pool.lock();
        let mut output = self.output.lock();
        Self::flip_buffers(&mut pool, &mut output);
    }

    /// Run the filter rack over the output
    pub fn filter(&self) {
        let mut output = self.output.lock();
        self.rack.lock().apply(&mut output);
    }

    /// Work on the filter rack under its lock.
    ///
    /// `f` must not call back into this track.
    pub fn with_rack<R>(&self, f: impl FnOnce(&mut Rack) -> R) -> R {
        f(&mut self.rack.lock())
    }

    /// Append a filter to the rack
    pub fn attach_filter(&self, filter: FilterHandle) {
        self.rack.lock().attach(filter);
    }

    /// Read the output buffer under its lock
    pub fn with_output<R>(&self, f: impl FnOnce(&SampleBuffer<f32>) -> R) -> R {
        f(&*self.output.lock())
    }

    /// Copy interleaved output samples into `dst`; returns how many were copied
    pub fn copy_output(&self, dst: &mut [f32]) -> usize {
        let output = self.output.lock();
        let n = dst.len().min(output.sample_count());
        dst[..n].copy_from_slice(&output.as_slice()[..n]);
        n
    }
}

impl Source for Track {
    fn make_active(&self) {
        for source in self.sources.lock().iter().filter_map(Weak::upgrade) {
            source.make_active();
        }
    }

    fn is_active(&self) -> bool {
        self.sources.lock().iter().any(|w| w.strong_count() > 0)
    }

    fn render(&self, buffer: &mut SampleBuffer<f32>, config: &RenderConfig) {
        let child_config = if config.quality.is_silent() {
            self.config.with_quality(config.quality)
        } else {
            self.config
        };

        let mut pool = self.pool.lock();
        let mut output = self.output.lock();
        self.pull_into(&mut pool, &child_config);
        Self::flip_buffers(&mut pool, &mut output);
        drop(pool);

        self.rack.lock().apply(&mut output);

        if config.quality.is_silent() {
            return;
        }

        let frames = self.frame_count().min(config.target_frame_count);
        for (i, frame) in output.frames().take(frames).enumerate() {
            let Some(index) = config.target_frame_offset.checked_add(i) else {
                break;
            };
            if !accumulate_frame(buffer, index, [frame[0], frame[1]]) {
                break;
            }
        }
    }

    fn release(&self) {
        let sources: Vec<_> = self.sources.lock().drain(..).collect();
        for source in sources.iter().filter_map(Weak::upgrade) {
            source.release();
        }
        tracing::debug!(track = %self.name, "track released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{handle, Mixer, PanLaw};
    use crate::sources::Sample;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const RATE: u32 = 48000;
    const FRAMES: usize = 64;

    /// Writes a constant into every frame it is asked for
    struct Constant {
        value: f32,
        active: AtomicBool,
        renders: AtomicUsize,
        muted: AtomicUsize,
    }

    impl Constant {
        fn shared(value: f32) -> Arc<Self> {
            Arc::new(Self {
                value,
                active: AtomicBool::new(true),
                renders: AtomicUsize::new(0),
                muted: AtomicUsize::new(0),
            })
        }
    }

    impl Source for Constant {
        fn make_active(&self) {
            self.active.store(true, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn render(&self, buffer: &mut SampleBuffer<f32>, config: &RenderConfig) {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if config.quality.is_silent() {
                self.muted.fetch_add(1, Ordering::SeqCst);
                return;
            }
            for i in config.target_frame_offset..config.end_frame() {
                accumulate_frame(buffer, i, [self.value, self.value]);
            }
        }

        fn release(&self) {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    /// Records its id into a shared log when rendered
    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Source for Recorder {
        fn make_active(&self) {}

        fn is_active(&self) -> bool {
            true
        }

        fn render(&self, _buffer: &mut SampleBuffer<f32>, _config: &RenderConfig) {
            self.log.lock().push(self.id);
        }

        fn release(&self) {}
    }

    fn as_source<S: Source + 'static>(source: &Arc<S>) -> Arc<dyn Source> {
        source.clone()
    }

    fn target() -> SampleBuffer<f32> {
        SampleBuffer::new(2, FRAMES).unwrap()
    }

    #[test]
    fn test_constant_source_round_trip() {
        let track = Track::new(RATE, FRAMES).unwrap();
        let source = as_source(&Constant::shared(0.25));
        assert!(track.attach(&source));

        let mut out = target();
        track.render(&mut out, &RenderConfig::new(RATE, FRAMES));

        assert!(out.as_slice().iter().all(|&s| s == 0.25));
        track.with_output(|output| {
            assert!(output.as_slice().iter().all(|&s| s == 0.25));
        });
        assert!(track.pool.lock().as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_pull_flip_filter_cycle() {
        let track = Track::new(RATE, FRAMES).unwrap();
        let source = as_source(&Constant::shared(0.5));
        track.attach(&source);
        track.attach_filter(handle(Mixer::new(0.5, 0.0, PanLaw::Linear)));

        track.pull();
        track.with_output(|output| assert!(output.as_slice().iter().all(|&s| s == 0.0)));

        track.flip();
        track.filter();

        let mut copy = vec![0.0; FRAMES * 2 + 10];
        assert_eq!(track.copy_output(&mut copy), FRAMES * 2);
        assert!(copy[..FRAMES * 2].iter().all(|&s| s == 0.25));
        assert!(copy[FRAMES * 2..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_paused_sample_contributes_nothing() {
        let data = vec![i16::MAX; FRAMES * 2];
        let sample = Arc::new(
            Sample::with_buffer("paused", SampleBuffer::from_interleaved(2, data).unwrap(), RATE, 1.0)
                .unwrap(),
        );
        sample.pause();

        let track = Track::new(RATE, FRAMES).unwrap();
        track.attach(&as_source(&sample));

        let mut out = target();
        track.render(&mut out, &RenderConfig::new(RATE, FRAMES));
        assert!(out.as_slice().iter().all(|&s| s == 0.0));
        assert_eq!(track.count_active(), 0);
    }

    #[test]
    fn test_nested_tracks_accumulate() {
        let inner = Arc::new(Track::new(RATE, FRAMES).unwrap());
        let inner_source = as_source(&Constant::shared(0.25));
        inner.attach(&inner_source);

        let outer = Track::new(RATE, FRAMES).unwrap();
        let direct = as_source(&Constant::shared(0.5));
        assert!(outer.attach(&as_source(&inner)));
        assert!(outer.attach(&direct));

        let mut out = target();
        outer.render(&mut out, &RenderConfig::new(RATE, FRAMES));
        assert!(out.as_slice().iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_dropped_source_is_skipped() {
        let track = Track::new(RATE, FRAMES).unwrap();
        let source = as_source(&Constant::shared(1.0));
        track.attach(&source);
        assert!(track.is_active());

        drop(source);
        assert!(!track.is_active());
        assert_eq!(track.source_count(), 0);

        let mut out = target();
        track.render(&mut out, &RenderConfig::new(RATE, FRAMES));
        assert!(out.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_attach_rules() {
        let track = Arc::new(Track::new(RATE, FRAMES).unwrap());
        let source = as_source(&Constant::shared(1.0));

        assert!(track.attach(&source));
        assert!(!track.attach(&source));
        assert_eq!(track.source_count(), 1);

        let itself = as_source(&track);
        assert!(!track.attach(&itself));

        assert!(track.detach(&source));
        assert!(!track.detach(&source));
        assert!(!track.is_active());
    }

    #[test]
    fn test_render_order_is_attachment_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let track = Track::new(RATE, FRAMES).unwrap();
        let sources: Vec<Arc<dyn Source>> = [3, 1, 2]
            .into_iter()
            .map(|id| {
                Arc::new(Recorder {
                    id,
                    log: log.clone(),
                }) as Arc<dyn Source>
            })
            .collect();
        for source in &sources {
            track.attach(source);
        }

        track.pull();
        track.pull();
        assert_eq!(*log.lock(), vec![3, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_skip_mutes_children() {
        let constant = Constant::shared(1.0);
        let track = Track::new(RATE, FRAMES).unwrap();
        track.attach(&as_source(&constant));

        track.skip();
        track.flip();
        assert_eq!(constant.muted.load(Ordering::SeqCst), 1);
        track.with_output(|output| assert!(output.as_slice().iter().all(|&s| s == 0.0)));
    }

    #[test]
    fn test_skip_advances_samples() {
        let data = vec![1000i16; 1000];
        let sample = Arc::new(
            Sample::with_buffer("s", SampleBuffer::from_interleaved(1, data).unwrap(), RATE, 1.0)
                .unwrap(),
        );
        let track = Track::new(RATE, FRAMES).unwrap();
        track.attach(&as_source(&sample));

        track.skip();
        assert_eq!(sample.loop_state().now, FRAMES as f64);
    }

    #[test]
    fn test_silent_target_quality_propagates() {
        let constant = Constant::shared(1.0);
        let track = Track::new(RATE, FRAMES).unwrap();
        track.attach(&as_source(&constant));

        let mut out = target();
        let config = RenderConfig::new(RATE, FRAMES).with_quality(RenderQuality::Mute);
        track.render(&mut out, &config);

        assert_eq!(constant.muted.load(Ordering::SeqCst), 1);
        assert!(out.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_render_offset_and_length() {
        let track = Track::new(RATE, 8).unwrap();
        let source = as_source(&Constant::shared(1.0));
        assert!(track.attach(&source));

        let mut out = SampleBuffer::<f32>::new(2, 16).unwrap();
        let config = RenderConfig::new(RATE, 4).with_offset(10);
        track.render(&mut out, &config);

        let lefts: Vec<f32> = out.frames().map(|f| f[0]).collect();
        assert!(lefts[..10].iter().all(|&s| s == 0.0));
        assert!(lefts[10..14].iter().all(|&s| s == 1.0));
        assert!(lefts[14..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_render_far_offset_writes_nothing() {
        let track = Track::new(RATE, 8).unwrap();
        let source = as_source(&Constant::shared(1.0));
        track.attach(&source);

        let mut out = SampleBuffer::<f32>::new(2, 16).unwrap();
        let config = RenderConfig::new(RATE, 8).with_offset(usize::MAX - 2);
        track.render(&mut out, &config);
        assert!(out.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_with_rack() {
        let track = Track::new(RATE, FRAMES).unwrap();
        assert!(track.with_rack(|rack| rack.is_empty()));

        track.attach_filter(handle(Mixer::new(0.5, 0.0, PanLaw::Linear)));
        track.with_rack(|rack| rack.attach(handle(Mixer::new(0.5, 0.0, PanLaw::Linear))));
        assert_eq!(track.with_rack(|rack| rack.len()), 2);

        let source = as_source(&Constant::shared(1.0));
        track.attach(&source);
        track.pull();
        track.flip();
        track.filter();
        track.with_output(|output| assert!(output.as_slice().iter().all(|&s| s == 0.25)));

        assert!(track.with_rack(|rack| rack.detach(0)).is_some());
        assert_eq!(track.with_rack(|rack| rack.len()), 1);
    }

    #[test]
    fn test_inactive_sources_are_not_rendered() {
        let constant = Constant::shared(1.0);
        constant.active.store(false, Ordering::SeqCst);
        let track = Track::new(RATE, FRAMES).unwrap();
        track.attach(&as_source(&constant));

        track.pull();
        assert_eq!(constant.renders.load(Ordering::SeqCst), 0);
        assert_eq!(track.count_active(), 0);

        track.make_active();
        assert_eq!(track.count_active(), 1);
    }

    #[test]
    fn test_release_releases_sources() {
        let constant = Constant::shared(1.0);
        let track = Track::new(RATE, FRAMES).unwrap();
        track.attach(&as_source(&constant));

        track.release();
        assert!(!constant.is_active());
        assert!(!track.is_active());
        assert_eq!(track.source_count(), 0);
    }

    #[test]
    fn test_invalid_construction() {
        assert_eq!(Track::new(0, 64).err(), Some(AweError::InvalidSampleRate));
        assert_eq!(Track::new(RATE, 0).err(), Some(AweError::InvalidFrameCount));
        let track = Track::new(RATE, 480).unwrap();
        assert!((track.buffer_length_ms() - 10.0).abs() < 1e-4);
    }
}
