//! Pending dialogue segments
//!
//! FIFO of segments produced by one generation response, consumed one
//! at a time as the user advances.

use std::collections::VecDeque;

use crate::dialogue::segment::DialogueSegment;

/// Ordered queue of segments awaiting display
#[derive(Debug, Default)]
pub struct DialogueQueue {
    segments: VecDeque<DialogueSegment>,
}

impl DialogueQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entire generation result
    pub fn enqueue_all(&mut self, segments: Vec<DialogueSegment>) {
        self.segments.extend(segments);
    }

    /// Pop the next segment, if any
    pub fn pop_next(&mut self) -> Option<DialogueSegment> {
        self.segments.pop_front()
    }

    /// Peek at the next segment without removing it
    pub fn peek(&self) -> Option<&DialogueSegment> {
        self.segments.front()
    }

    /// Number of pending segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop all pending segments
    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
