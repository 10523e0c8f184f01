// Ordered hand-off of completed recordings to the downstream consumer

use crate::recording::RecordingMode;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// One item on the dispatch queue
///
/// Ownership of the referenced file transfers to the consumer on
/// dequeue; the producer must not touch it afterward. `Shutdown` is the
/// terminal item: after receiving it the consumer must not call
/// `dequeue` again.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    /// A finished recording ready for downstream processing
    Recording {
        file_path: String,
        mode: RecordingMode,
        is_trigger: bool,
    },
    /// Shut down the consumer
    Shutdown,
}

/// Unbounded FIFO queue between recording sessions and the consumer
///
/// `enqueue` never blocks; `dequeue` blocks until an item arrives.
/// Enqueue order is preserved.
pub struct AudioDispatchQueue {
    items: Mutex<VecDeque<QueueItem>>,
    available: Condvar,
}

impl AudioDispatchQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an item; wakes one blocked consumer
    pub fn enqueue(&self, item: QueueItem) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.available.notify_one();
    }

    /// Block until an item is available, then take it
    pub fn dequeue(&self) -> QueueItem {
        let mut items = self.items.lock();
        while items.is_empty() {
            self.available.wait(&mut items);
        }
        items.pop_front().expect("queue non-empty after wait")
    }

    /// Take an item if one is immediately available
    pub fn try_dequeue(&self) -> Option<QueueItem> {
        self.items.lock().pop_front()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl Default for AudioDispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
