//! Session Buffer
//!
//! Bounded hand-off from the acceptor to the worker pool. A `free`
//! semaphore counts empty slots and a `filled` semaphore counts pending
//! items; the items themselves sit in a lock-free `ArrayQueue`.
//!
//! Items are delivered in arrival order in practice, but callers must not
//! rely on any ordering.

use crossbeam_queue::ArrayQueue;

use crate::sync::Semaphore;

/// Fixed-capacity blocking queue of pending sessions
#[derive(Debug)]
pub struct SessionBuffer<T> {
    queue: ArrayQueue<T>,
    free: Semaphore,
    filled: Semaphore,
}

impl<T> SessionBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "session buffer capacity must be non-zero");
        Self {
            queue: ArrayQueue::new(capacity),
            free: Semaphore::new(capacity),
            filled: Semaphore::new(0),
        }
    }

    /// Deposit an item, blocking while the buffer is full.
    ///
    /// Hands the item back if the buffer was closed.
    pub fn put(&self, item: T) -> Result<(), T> {
        if !self.free.acquire() {
            return Err(item);
        }
        if let Err(item) = self.queue.push(item) {
            self.free.release();
            return Err(item);
        }
        self.filled.release();
        Ok(())
    }

    /// Remove an item, blocking while the buffer is empty.
    ///
    /// Returns `None` once the buffer is closed.
    pub fn take(&self) -> Option<T> {
        if !self.filled.acquire() {
            return None;
        }
        let item = self.queue.pop();
        self.free.release();
        item
    }

    /// Remove an item only if one is pending
    pub fn try_take(&self) -> Option<T> {
        if !self.filled.try_acquire() {
            return None;
        }
        let item = self.queue.pop();
        self.free.release();
        item
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Wake every blocked `put` and `take`; both fail from now on.
    pub fn close(&self) {
        self.free.close();
        self.filled.close();
    }

    pub fn is_closed(&self) -> bool {
        self.filled.is_closed()
    }
}
