use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Work item handed from the session state machine to the recorder
/// worker.
#[derive(Debug)]
pub enum WorkItem {
    /// A stamped frame for the encoder. `cache_only` marks frames
    /// produced during the glue window: the worker encodes them but
    /// holds the result back until motion resumes or the session stops.
    Frame { bytes: Vec<u8>, cache_only: bool },
    /// Stop sentinel. With `discard` set the session is being aborted
    /// and no output file may be committed.
    Stop { discard: bool },
}

/// Unbounded FIFO between the calling thread and the recorder worker.
///
/// This is the only structure the two threads share. `push` never
/// blocks the caller; `pop` blocks the worker until an item arrives.
/// Backpressure is not enforced here; the session's depth check is
/// the policy layer on top.
pub struct FrameQueue {
    items: Mutex<VecDeque<WorkItem>>,
    ready: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Enqueue a frame for encoding and forwarding
    pub fn push(&self, bytes: Vec<u8>) {
        self.push_item(WorkItem::Frame {
            bytes,
            cache_only: false,
        });
    }

    /// Enqueue a frame for encoding into the hold-back buffer
    pub fn push_cached(&self, bytes: Vec<u8>) {
        self.push_item(WorkItem::Frame {
            bytes,
            cache_only: true,
        });
    }

    /// Ask the worker to finish cleanly and commit the output file
    pub fn stop(&self) {
        self.push_item(WorkItem::Stop { discard: false });
    }

    /// Abort: clear the queued backlog and deliver an immediate discard
    /// sentinel. Returns the number of items dropped.
    pub fn abort(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        items.push_back(WorkItem::Stop { discard: true });
        self.ready.notify_one();
        dropped
    }

    /// Dequeue the next item, blocking while the queue is empty
    pub fn pop(&self) -> WorkItem {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.ready.wait(&mut items);
        }
    }

    /// Current queue depth
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn push_item(&self, item: WorkItem) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.ready.notify_one();
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new();
        queue.push(vec![1]);
        queue.push_cached(vec![2]);
        queue.stop();

        match queue.pop() {
            WorkItem::Frame { bytes, cache_only } => {
                assert_eq!(bytes, vec![1]);
                assert!(!cache_only);
            }
            other => panic!("Unexpected item: {:?}", other),
        }
        match queue.pop() {
            WorkItem::Frame { bytes, cache_only } => {
                assert_eq!(bytes, vec![2]);
                assert!(cache_only);
            }
            other => panic!("Unexpected item: {:?}", other),
        }
        match queue.pop() {
            WorkItem::Stop { discard } => assert!(!discard),
            other => panic!("Unexpected item: {:?}", other),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(FrameQueue::new());
        let consumer_queue = Arc::clone(&queue);

        let consumer = thread::spawn(move || match consumer_queue.pop() {
            WorkItem::Frame { bytes, .. } => bytes,
            other => panic!("Unexpected item: {:?}", other),
        });

        thread::sleep(Duration::from_millis(50));
        queue.push(vec![42]);

        assert_eq!(consumer.join().unwrap(), vec![42]);
    }

    #[test]
    fn test_abort_discards_backlog() {
        let queue = FrameQueue::new();
        queue.push(vec![1]);
        queue.push(vec![2]);
        queue.push(vec![3]);

        let dropped = queue.abort();
        assert_eq!(dropped, 3);
        assert_eq!(queue.len(), 1);

        // The discard sentinel is the next and only item
        match queue.pop() {
            WorkItem::Stop { discard } => assert!(discard),
            other => panic!("Unexpected item: {:?}", other),
        }
        assert!(queue.is_empty());
    }
}
