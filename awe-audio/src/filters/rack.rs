//! Filter rack - an ordered chain of shared filters

use super::{Filter, FilterHandle};
use crate::buffer::SampleBuffer;

/// Runs its filters in attachment order
#[derive(Default)]
pub struct Rack {
    filters: Vec<FilterHandle>,
}

impl Rack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter to the end of the chain
    pub fn attach(&mut self, filter: FilterHandle) {
        let name = filter.lock().name();
        self.filters.push(filter);
        tracing::debug!(filter = name, count = self.filters.len(), "filter attached");
    }

    /// Remove the filter at `index`
    pub fn detach(&mut self, index: usize) -> Option<FilterHandle> {
        if index >= self.filters.len() {
            return None;
        }
        Some(self.filters.remove(index))
    }

    /// Shared handle to the filter at `index`
    pub fn get(&self, index: usize) -> Option<FilterHandle> {
        self.filters.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }
}

impl Filter for Rack {
    fn reset_state(&mut self) {
        for filter in &self.filters {
            filter.lock().reset_state();
        }
    }

    fn apply(&mut self, buffer: &mut SampleBuffer<f32>) {
        for filter in &self.filters {
            filter.lock().apply(buffer);
        }
    }

    fn name(&self) -> &'static str {
        "Rack"
    }
}
