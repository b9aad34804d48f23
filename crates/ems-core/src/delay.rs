//! Artificial state-access delay
//!
//! Simulates a costly storage medium. The delay is applied by the store
//! and the engine *inside* the critical section that guards the state
//! being touched, so raising it throttles throughput under contention.

use std::thread;
use std::time::Duration;

/// Sleep injected on every access to shared event state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateAccessDelay(Duration);

impl StateAccessDelay {
    pub const fn new(delay: Duration) -> Self {
        Self(delay)
    }

    pub const fn from_micros(us: u32) -> Self {
        Self(Duration::from_micros(us as u64))
    }

    /// No delay at all (tests)
    pub const fn none() -> Self {
        Self(Duration::ZERO)
    }

    pub const fn duration(&self) -> Duration {
        self.0
    }

    /// Block the calling thread for the configured delay
    #[inline]
    pub fn apply(&self) {
        if !self.0.is_zero() {
            thread::sleep(self.0);
        }
    }
}
