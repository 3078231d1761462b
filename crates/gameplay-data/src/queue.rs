use std::collections::VecDeque;

use uuid::Uuid;

use crate::types::ApiCall;

/// Bounded FIFO of calls waiting to be retried.
///
/// Backed by a `VecDeque`. When the queue is full, the oldest call is
/// evicted on each push and handed back to the caller. Snapshots are in
/// submission order.
#[derive(Debug, Clone)]
pub struct RetryQueue {
    calls: VecDeque<ApiCall>,
    capacity: usize,
}

impl RetryQueue {
    /// Creates an empty queue. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            calls: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a call, returning the evicted oldest call if the queue was full.
    pub fn push(&mut self, call: ApiCall) -> Option<ApiCall> {
        let evicted = if self.calls.len() >= self.capacity {
            self.calls.pop_front()
        } else {
            None
        };
        self.calls.push_back(call);
        evicted
    }

    /// Oldest pending call.
    pub fn front(&self) -> Option<&ApiCall> {
        self.calls.front()
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ApiCall> {
        self.calls.iter_mut().find(|c| c.id == id)
    }

    /// Removes the call with `id`, wherever it sits.
    pub fn remove(&mut self, id: Uuid) -> Option<ApiCall> {
        let idx = self.calls.iter().position(|c| c.id == id)?;
        self.calls.remove(idx)
    }

    /// Changes the capacity, evicting oldest-first if it shrank.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<ApiCall> {
        self.capacity = capacity.max(1);
        let excess = self.calls.len().saturating_sub(self.capacity);
        self.calls.drain(..excess).collect()
    }

    /// Copies the pending calls, oldest first.
    pub fn snapshot(&self) -> Vec<ApiCall> {
        self.calls.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Removes every call, returning them oldest first.
    pub fn clear(&mut self) -> Vec<ApiCall> {
        self.calls.drain(..).collect()
    }
}
