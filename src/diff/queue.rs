//! Queues shared between the UI thread and the scanner/comparator/priority
//! worker threads (spec.md §4.F.2).
//!
//! `scan_queue` and `comparison_queue` are plain FIFOs; `crossbeam_channel`
//! already gives us a `recv_timeout` that satisfies the 100 ms
//! cancellation-poll requirement, so they are thin type aliases. The
//! priority queue has no FIFO-channel equivalent, so it gets a small
//! `BinaryHeap` + `Condvar` wrapper with the same timed-pop shape.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::types::ScanTask;

pub type FifoSender<T> = crossbeam_channel::Sender<T>;
pub type FifoReceiver<T> = crossbeam_channel::Receiver<T>;

pub fn fifo<T>() -> (FifoSender<T>, FifoReceiver<T>) {
    crossbeam_channel::unbounded()
}

/// `priority_queue: PriorityQueue<(-priority, counter, ScanTask)>`
/// (spec.md §4.F.2): higher `priority` dequeues first, `counter` breaks
/// ties in FIFO order.
struct PriorityItem {
    priority: i32,
    counter: u64,
    task: ScanTask,
}

impl PartialEq for PriorityItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.counter == other.counter
    }
}
impl Eq for PriorityItem {}

impl PartialOrd for PriorityItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: higher priority must compare greater.
        // For equal priority, the *smaller* counter (queued earlier) must
        // compare greater so it pops first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.counter.cmp(&self.counter))
    }
}

pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<PriorityItem>>,
    not_empty: Condvar,
    counter: AtomicU64,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            not_empty: Condvar::new(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn push(&self, task: ScanTask) {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut heap = self.heap.lock();
        heap.push(PriorityItem { priority: task.priority, counter, task });
        self.not_empty.notify_one();
    }

    /// Block up to `timeout` for a task, returning `None` if none arrived.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<ScanTask> {
        let mut heap = self.heap.lock();
        if heap.is_empty() {
            let result = self.not_empty.wait_for(&mut heap, timeout);
            if result.timed_out() && heap.is_empty() {
                return None;
            }
        }
        heap.pop().map(|item| item.task)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Drain every pending task without processing it (shutdown, spec.md
    /// §4.F.11).
    pub fn drain(&self) {
        self.heap.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(priority: i32, relative_path: &str) -> ScanTask {
        ScanTask {
            left_path: None,
            right_path: None,
            relative_path: relative_path.to_string(),
            priority,
            is_visible: true,
        }
    }

    #[test]
    fn higher_priority_pops_first() {
        let queue = PriorityQueue::new();
        queue.push(task(10, "low"));
        queue.push(task(100, "high"));
        let first = queue.pop_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.relative_path, "high");
    }

    #[test]
    fn equal_priority_is_fifo() {
        let queue = PriorityQueue::new();
        queue.push(task(10, "first"));
        queue.push(task(10, "second"));
        let first = queue.pop_timeout(Duration::from_millis(10)).unwrap();
        let second = queue.pop_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.relative_path, "first");
        assert_eq!(second.relative_path, "second");
    }

    #[test]
    fn pop_on_empty_queue_times_out() {
        let queue = PriorityQueue::new();
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn drain_empties_queue() {
        let queue = PriorityQueue::new();
        queue.push(task(1, "a"));
        queue.drain();
        assert!(queue.is_empty());
    }
}
