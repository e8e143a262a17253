//! Buffer filters for the mixing engine
//!
//! Every filter works in place on a whole [`SampleBuffer<f32>`]. Tracks own a
//! [`Rack`] and run it over their output after each flip.

mod eq;
mod iir;
mod limiter;
mod meter;
mod mixer;
mod rack;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::SampleBuffer;

pub use eq::ThreeBandEq;
pub use iir::{Iir, IirCoefficients};
pub use limiter::Limiter;
pub use meter::{Meter, MeterReading};
pub use mixer::{Mixer, PanLaw};
pub use rack::Rack;

/// Shared, lockable filter as stored in a [`Rack`]
pub type FilterHandle = Arc<Mutex<dyn Filter>>;

/// Trait for in-place buffer filters
pub trait Filter: Send {
    /// Clear internal state (delay lines, envelopes); parameters are kept
    fn reset_state(&mut self);

    /// Process every frame of `buffer` in place
    fn apply(&mut self, buffer: &mut SampleBuffer<f32>);

    /// Get filter name
    fn name(&self) -> &'static str;
}

/// Wrap a filter into a [`FilterHandle`]
pub fn handle<F: Filter + 'static>(filter: F) -> FilterHandle {
    Arc::new(Mutex::new(filter))
}
