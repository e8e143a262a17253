//! Sample-accurate audio mixing engine
//!
//! - Sources: decoded samples and resampling samplers that render into stereo buffers
//! - Track: double-buffered composite source with a filter rack
//! - Filters: mixer gain/pan, IIR, three-band EQ, meter, limiter
//! - Engine: master track feeding a lock-free FIFO for the audio device

mod buffer;
mod config;
mod engine;
mod error;
pub mod filters;
mod looping;
mod sources;
mod track;

pub use buffer::{generate_sine, to_float, to_int, PcmSample, SampleBuffer};
pub use config::{EngineConfig, RenderConfig, RenderQuality};
pub use engine::{Engine, EngineOutput};
pub use error::{AweError, Result};
pub use filters::{
    Filter, FilterHandle, Iir, IirCoefficients, Limiter, Meter, MeterReading, Mixer, PanLaw, Rack,
    ThreeBandEq,
};
pub use looping::{Direction, Loop, LoopMethod, LoopMode};
pub use sources::{Sample, Sampler, Source, DEFAULT_CHUNK_SIZE};
pub use track::Track;
