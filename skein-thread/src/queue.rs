use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::codec::Payload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum QueueError {
    #[error("queue operation interrupted")]
    #[diagnostic(code(skein::queue::interrupted))]
    Interrupted,

    #[error("queue operation would block")]
    #[diagnostic(code(skein::queue::would_block))]
    WouldBlock,

    #[error("queue terminated")]
    #[diagnostic(code(skein::queue::terminated))]
    Terminated,
}

impl QueueError {
    /// The short code scripts receive.
    pub fn code(self) -> &'static str {
        match self {
            QueueError::Interrupted => "EINTR",
            QueueError::WouldBlock => "EAGAIN",
            QueueError::Terminated => "EOF",
        }
    }
}

struct QueueState {
    items: VecDeque<Payload>,
    /// Bumped by `interrupt_all`; blocked callers compare it with the value
    /// they saw on entry.
    epoch: u64,
    terminated: bool,
}

struct QueueInner {
    capacity: usize,
    state: Mutex<QueueState>,
    readable: Condvar,
    writable: Condvar,
}

/// Bounded FIFO of encoded tuples shared between threads.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct ThreadQueue {
    inner: Arc<QueueInner>,
}

impl fmt::Debug for ThreadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ThreadQueue")
            .field("capacity", &self.inner.capacity)
            .field("len", &state.items.len())
            .field("terminated", &state.terminated)
            .finish()
    }
}

impl ThreadQueue {
    /// A queue holding at most `capacity` tuples (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                capacity: capacity.max(1),
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    epoch: 0,
                    terminated: false,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminated
    }

    pub fn same_queue(&self, other: &ThreadQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append `item`, waiting while the queue is full.
    pub fn push(&self, item: Payload) -> Result<(), QueueError> {
        let mut state = self.inner.state.lock();
        let epoch = state.epoch;
        loop {
            if state.terminated {
                return Err(QueueError::Terminated);
            }
            if state.epoch != epoch {
                return Err(QueueError::Interrupted);
            }
            if state.items.len() < self.inner.capacity {
                state.items.push_back(item);
                self.inner.readable.notify_one();
                return Ok(());
            }
            self.inner.writable.wait(&mut state);
        }
    }

    /// Remove the oldest item, waiting while the queue is empty.
    pub fn pop(&self) -> Result<Payload, QueueError> {
        let mut state = self.inner.state.lock();
        let epoch = state.epoch;
        loop {
            if state.terminated {
                return Err(QueueError::Terminated);
            }
            if state.epoch != epoch {
                return Err(QueueError::Interrupted);
            }
            if let Some(item) = state.items.pop_front() {
                self.inner.writable.notify_one();
                return Ok(item);
            }
            self.inner.readable.wait(&mut state);
        }
    }

    pub fn try_push(&self, item: Payload) -> Result<(), QueueError> {
        let mut state = self.inner.state.lock();
        if state.terminated {
            return Err(QueueError::Terminated);
        }
        if state.items.len() >= self.inner.capacity {
            return Err(QueueError::WouldBlock);
        }
        state.items.push_back(item);
        self.inner.readable.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Result<Payload, QueueError> {
        let mut state = self.inner.state.lock();
        if state.terminated {
            return Err(QueueError::Terminated);
        }
        let item = state.items.pop_front().ok_or(QueueError::WouldBlock)?;
        self.inner.writable.notify_one();
        Ok(item)
    }

    /// Wake every caller currently blocked in `push` or `pop` with
    /// [`QueueError::Interrupted`]. Later calls are unaffected.
    pub fn interrupt_all(&self) {
        let mut state = self.inner.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        self.inner.readable.notify_all();
        self.inner.writable.notify_all();
    }

    /// Fail every current and future operation with
    /// [`QueueError::Terminated`], discarding queued items.
    pub fn terminate(&self) {
        let mut state = self.inner.state.lock();
        state.terminated = true;
        state.items.clear();
        self.inner.readable.notify_all();
        self.inner.writable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Portable, decode, encode};

    fn item(n: f64) -> Payload {
        encode(&[Portable::Number(n)]).unwrap()
    }

    fn number(payload: Payload) -> f64 {
        match decode(&payload).unwrap().as_slice() {
            [Portable::Number(n)] => *n,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn fifo_order_within_capacity() {
        let q = ThreadQueue::new(2);
        q.try_push(item(1.0)).unwrap();
        q.try_push(item(2.0)).unwrap();
        assert_eq!(q.try_push(item(3.0)), Err(QueueError::WouldBlock));
        assert_eq!(number(q.try_pop().unwrap()), 1.0);
        assert_eq!(number(q.pop().unwrap()), 2.0);
        assert_eq!(q.try_pop().unwrap_err(), QueueError::WouldBlock);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(ThreadQueue::new(0).capacity(), 1);
    }

    #[test]
    fn terminate_fails_everything_after() {
        let q = ThreadQueue::new(4);
        q.push(item(1.0)).unwrap();
        assert!(!q.is_terminated());
        q.terminate();
        assert!(q.is_terminated());
        assert!(q.clone().is_terminated());
        assert_eq!(q.pop().unwrap_err(), QueueError::Terminated);
        assert_eq!(q.push(item(2.0)), Err(QueueError::Terminated));
        assert!(q.is_empty());
        assert_eq!(QueueError::Terminated.code(), "EOF");
    }
}
