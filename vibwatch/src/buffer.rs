//! Bounded buffers: the chart's sample window and a capped push helper.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::types::Sample;

/// Visible chart window size.
pub const CAPACITY: usize = 200;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

/// Most recent window of raw samples.
///
/// Every push replaces the window wholesale (last write wins); no merging or
/// deduplication happens between batches from different producers.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    window: Arc<[Sample]>,
    cap: usize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            window: Arc::from(Vec::<Sample>::new()),
            cap,
        }
    }

    /// Keep the last `min(samples.len(), cap)` entries. An empty batch is a no-op.
    pub fn push(&mut self, samples: &[Sample]) -> bool {
        if samples.is_empty() {
            return false;
        }
        let start = samples.len().saturating_sub(self.cap);
        self.window = Arc::from(&samples[start..]);
        true
    }

    /// Cheap shared handle to the current window.
    pub fn snapshot(&self) -> Arc<[Sample]> {
        Arc::clone(&self.window)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
