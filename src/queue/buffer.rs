use super::task::Task;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// Unbounded multi-producer/multi-consumer buffer of upload tasks
///
/// `try_pop` never waits for work; an empty queue returns `None` at once.
#[derive(Debug, Default)]
pub struct TaskQueue {
    items: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task at the tail
    pub fn push(&self, task: Task) {
        let mut items = self.lock();
        items.push_back(task);
        trace!(depth = items.len(), "Task enqueued");
    }

    /// Take the head task, if any
    pub fn try_pop(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A producer panicking mid-push cannot leave the deque half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
