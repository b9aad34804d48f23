//! Counting semaphore
//!
//! Blocks the OS thread on a condition variable while no permit is
//! available. A closed semaphore wakes every waiter and refuses new
//! acquisitions, which is how blocked workers are released at shutdown.

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct State {
    permits: usize,
    closed: bool,
}

/// Counting semaphore over `parking_lot` primitives
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State { permits, closed: false }),
            cond: Condvar::new(),
        }
    }

    /// Take one permit, blocking until one is released.
    ///
    /// Returns `false` if the semaphore was closed while waiting.
    pub fn acquire(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return false;
            }
            if state.permits > 0 {
                state.permits -= 1;
                return true;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Take one permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.permits == 0 {
            return false;
        }
        state.permits -= 1;
        true
    }

    /// Return one permit and wake one waiter
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        drop(state);
        self.cond.notify_one();
    }

    pub fn available(&self) -> usize {
        self.state.lock().permits
    }

    /// Refuse further acquisitions and wake all waiters
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
