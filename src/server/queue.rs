//! Bounded message queue between the listener thread and the tick loop
//!
//! Lock-free and safe for one producer and one consumer running
//! concurrently. Neither side ever blocks: a full queue refuses new
//! messages, an empty queue drains to nothing.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::protocol::OscMessage;

/// Bounded FIFO of inbound messages
pub struct MessageQueue {
    queue: ArrayQueue<OscMessage>,
    overflow_count: AtomicU64,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicU64::new(0),
        }
    }

    /// Enqueue without blocking.
    /// Returns false and drops the message if the queue is full.
    pub fn push(&self, msg: OscMessage) -> bool {
        match self.queue.push(msg) {
            Ok(()) => true,
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Dequeue up to `n` messages in arrival order without blocking
    pub fn drain_up_to(&self, n: usize) -> Vec<OscMessage> {
        let mut out = Vec::with_capacity(n.min(self.queue.len()));
        while out.len() < n {
            match self.queue.pop() {
                Some(msg) => out.push(msg),
                None => break,
            }
        }
        out
    }

    /// Discard everything currently queued, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.queue.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Messages refused because the queue was full
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }
}

/// Handle shared by the listener and the tick loop
pub type SharedQueue = Arc<MessageQueue>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OscArg;
    use std::thread;

    fn msg(i: i32) -> OscMessage {
        OscMessage::new("/seq", vec![OscArg::Int(i)])
    }

    #[test]
    fn test_fifo_order() {
        let queue = MessageQueue::new(8);
        assert!(queue.push(msg(1)));
        assert!(queue.push(msg(2)));
        assert!(queue.push(msg(3)));

        assert_eq!(queue.drain_up_to(10), vec![msg(1), msg(2), msg(3)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_respects_limit() {
        let queue = MessageQueue::new(8);
        for i in 0..5 {
            queue.push(msg(i));
        }
        assert_eq!(queue.drain_up_to(2), vec![msg(0), msg(1)]);
        assert_eq!(queue.len(), 3);
        assert!(queue.drain_up_to(0).is_empty());
        assert_eq!(queue.drain_up_to(100).len(), 3);
        assert!(queue.drain_up_to(100).is_empty());
    }

    #[test]
    fn test_refuses_newest_when_full() {
        let queue = MessageQueue::new(3);
        for i in 0..3 {
            assert!(queue.push(msg(i)));
        }
        assert!(queue.is_full());
        assert!(!queue.push(msg(99)));
        assert!(!queue.push(msg(100)));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.overflow_count(), 2);
        assert_eq!(queue.drain_up_to(10), vec![msg(0), msg(1), msg(2)]);
    }

    #[test]
    fn test_clear() {
        let queue = MessageQueue::new(4);
        queue.push(msg(1));
        queue.push(msg(2));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 4);
    }

    #[test]
    fn test_concurrent_producer_keeps_order() {
        let queue: SharedQueue = Arc::new(MessageQueue::new(64));
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut i = 0;
                while i < 1000 {
                    if queue.push(msg(i)) {
                        i += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 1000 {
            received.extend(queue.drain_up_to(16));
        }
        producer.join().unwrap();

        let expected: Vec<_> = (0..1000).map(msg).collect();
        assert_eq!(received, expected);
    }
}
