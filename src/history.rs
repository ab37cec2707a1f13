//! Bounded rolling outcome history per table
//!
//! The upstream results feed is authoritative and already ordered
//! newest-first, so the buffer is replaced wholesale on every fetch cycle
//! rather than appended to.

use crate::pattern::Outcome;

/// Fixed-capacity, newest-first sequence of the most recent outcomes.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    outcomes: Vec<Outcome>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outcomes: Vec::with_capacity(capacity),
        }
    }

    /// Replace the buffer with a freshly fetched outcome list (newest
    /// first), keeping at most `capacity` entries.
    pub fn replace(&mut self, fresh: &[Outcome]) {
        self.outcomes.clear();
        self.outcomes
            .extend_from_slice(&fresh[..fresh.len().min(self.capacity)]);
    }

    /// Most recent outcome, if any.
    pub fn latest(&self) -> Option<Outcome> {
        self.outcomes.first().copied()
    }

    pub fn as_slice(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
