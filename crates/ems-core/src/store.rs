//! Event store with two-level locking
//!
//! The store is an insertion-ordered index from [`EventId`] to an
//! independently lockable [`Event`]:
//!
//! - the **store lock** (`RwLock`) covers structural access: `create`
//!   takes it for writing, `find`/`list` for reading;
//! - the **event lock** (inside each `Event`) covers that event's grid.
//!
//! `find` clones the `Arc<Event>` and drops the store lock before the
//! caller touches the event lock. The two locks are never held together,
//! so a creator waiting on the store lock can never deadlock with a
//! reader waiting on an event lock.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::delay::StateAccessDelay;
use crate::error::{EmsError, EmsResult};
use crate::event::{Event, SeatGrid};
use crate::id::EventId;

/// Process-wide collection of events
#[derive(Debug)]
pub struct EventStore {
    events: RwLock<IndexMap<EventId, Arc<Event>>>,
    delay: StateAccessDelay,
}

impl EventStore {
    pub fn new(delay: StateAccessDelay) -> Self {
        Self {
            events: RwLock::new(IndexMap::new()),
            delay,
        }
    }

    pub fn delay(&self) -> StateAccessDelay {
        self.delay
    }

    /// Insert a zeroed `rows x cols` event under the store write lock.
    pub fn create(&self, id: EventId, rows: usize, cols: usize) -> EmsResult<()> {
        let mut events = self.events.write();
        self.delay.apply();

        if events.contains_key(&id) {
            return Err(EmsError::AlreadyExists(id));
        }

        let event = Event::new(id, rows, cols)?;
        events.insert(id, Arc::new(event));
        debug!(event = %id, rows, cols, "event created");
        Ok(())
    }

    /// Look up an event under the store read lock.
    ///
    /// The returned handle outlives the lock; callers lock the event
    /// itself afterwards.
    pub fn find(&self, id: EventId) -> EmsResult<Arc<Event>> {
        let events = self.events.read();
        self.delay.apply();
        events.get(&id).cloned().ok_or(EmsError::NotFound(id))
    }

    /// All event ids in insertion order
    pub fn list(&self) -> Vec<EventId> {
        let events = self.events.read();
        self.delay.apply();
        events.keys().copied().collect()
    }

    /// Run `f` against one event's grid while holding its event lock.
    ///
    /// The store lock is released before the event lock is taken.
    pub fn with_event<R>(
        &self,
        id: EventId,
        f: impl FnOnce(&Event, &mut SeatGrid) -> EmsResult<R>,
    ) -> EmsResult<R> {
        let event = self.find(id)?;
        let mut grid = event.lock();
        f(&event, &mut grid)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drop every event under the write lock.
    ///
    /// Holding the write lock means no lookup is in flight while the
    /// index is cleared. Sessions already holding an `Arc<Event>` finish
    /// against their copy. Returns the number of events released.
    pub fn terminate(&self) -> usize {
        let mut events = self.events.write();
        let released = events.len();
        events.clear();
        released
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(StateAccessDelay::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_create_then_find() {
        let store = EventStore::default();
        store.create(EventId::new(1), 3, 2).unwrap();

        let event = store.find(EventId::new(1)).unwrap();
        assert_eq!((event.rows(), event.cols()), (3, 2));
        let grid = event.lock();
        assert!(event.snapshot(&grid).is_vacant());
    }

    #[test]
    fn test_duplicate_create_keeps_original() {
        let store = EventStore::default();
        store.create(EventId::new(1), 2, 2).unwrap();

        let err = store.create(EventId::new(1), 5, 5).unwrap_err();
        assert!(matches!(err, EmsError::AlreadyExists(id) if id == EventId::new(1)));

        let event = store.find(EventId::new(1)).unwrap();
        assert_eq!((event.rows(), event.cols()), (2, 2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_missing() {
        let store = EventStore::default();
        assert!(matches!(
            store.find(EventId::new(9)),
            Err(EmsError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_insertion_order() {
        let store = EventStore::default();
        assert!(store.list().is_empty());

        for id in [5, 1, 3] {
            store.create(EventId::new(id), 1, 1).unwrap();
        }
        let ids: Vec<u32> = store.list().into_iter().map(EventId::as_u32).collect();
        assert_eq!(ids, vec![5, 1, 3]);
    }

    #[test]
    fn test_invalid_dimensions_not_inserted() {
        let store = EventStore::default();
        assert!(store.create(EventId::new(1), 0, 0).is_err());
        assert!(store.is_empty());
        // The id stays free for a valid create.
        store.create(EventId::new(1), 1, 1).unwrap();
    }

    #[test]
    fn test_concurrent_create_same_id() {
        let store = Arc::new(EventStore::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create(EventId::new(42), 2, 2).is_ok())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_event_lock_does_not_block_store() {
        let store = Arc::new(EventStore::default());
        store.create(EventId::new(1), 1, 1).unwrap();

        let event = store.find(EventId::new(1)).unwrap();
        let _held = event.lock();

        // Creating and finding other events proceeds while event 1 is locked.
        let other = Arc::clone(&store);
        let h = thread::spawn(move || {
            other.create(EventId::new(2), 1, 1).unwrap();
            other.find(EventId::new(1)).is_ok()
        });
        assert!(h.join().unwrap());
    }

    #[test]
    fn test_delay_applied_under_lock() {
        let store = EventStore::new(StateAccessDelay::new(Duration::from_millis(2)));
        let start = Instant::now();
        store.create(EventId::new(1), 1, 1).unwrap();
        store.find(EventId::new(1)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn test_terminate() {
        let store = EventStore::default();
        store.create(EventId::new(1), 1, 1).unwrap();
        store.create(EventId::new(2), 1, 1).unwrap();
        let held = store.find(EventId::new(1)).unwrap();

        assert_eq!(store.terminate(), 2);
        assert!(store.is_empty());
        assert!(store.find(EventId::new(1)).is_err());
        // Outstanding handles stay valid.
        assert_eq!(held.rows(), 1);
    }
}
