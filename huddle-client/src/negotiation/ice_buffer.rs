use huddle_core::IceCandidate;
use std::collections::VecDeque;

/// Remote candidates that arrived before the remote description.
///
/// Candidates come out in arrival order and each one exactly once.
#[derive(Debug, Default)]
pub struct IceBuffer {
    queue: VecDeque<IceCandidate>,
    limit: Option<usize>,
}

impl IceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that refuses candidates past `limit`.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            limit: Some(limit),
        }
    }

    /// Returns `false` if the buffer is full and the candidate was refused.
    pub fn push(&mut self, candidate: IceCandidate) -> bool {
        if self.limit.is_some_and(|limit| self.queue.len() >= limit) {
            return false;
        }
        self.queue.push_back(candidate);
        true
    }

    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.queue.drain(..).collect()
    }

    /// Move every candidate of `other` behind the ones already queued.
    pub fn append(&mut self, other: &mut IceBuffer) {
        self.queue.append(&mut other.queue);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
