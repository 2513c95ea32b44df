use meshlink_core::IceCandidate;
use std::collections::VecDeque;

pub const DEFAULT_CANDIDATE_CAPACITY: usize = 64;

/// Remote candidates that arrived before any remote description was applied.
/// Bounded FIFO: pushing into a full buffer evicts the oldest entry.
#[derive(Debug)]
pub struct CandidateBuffer {
    queue: VecDeque<IceCandidate>,
    capacity: usize,
    evicted: u64,
}

impl CandidateBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Returns the candidate that had to be dropped to make room, if any.
    pub fn push(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        let dropped = if self.queue.len() == self.capacity {
            self.evicted += 1;
            self.queue.pop_front()
        } else {
            None
        };
        self.queue.push_back(candidate);
        dropped
    }

    /// Empties the buffer, returning its contents in arrival order.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of candidates dropped on overflow.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for CandidateBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATE_CAPACITY)
    }
}
