//! Reservation engine
//!
//! Validates and commits seat reservations against one event's grid.
//! Every operation on an event runs entirely under that event's lock:
//! validation and commit form one atomic unit, so a failed request never
//! leaves a partial write behind.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EmsError, EmsResult};
use crate::event::{GridSnapshot, Seat};
use crate::id::{EventId, ReservationId};
use crate::store::EventStore;

/// Front end for all event operations, shared by every worker
#[derive(Debug, Clone)]
pub struct ReservationEngine {
    store: Arc<EventStore>,
}

impl ReservationEngine {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Create a new event. See [`EventStore::create`].
    pub fn create(&self, id: EventId, rows: usize, cols: usize) -> EmsResult<()> {
        self.store.create(id, rows, cols)
    }

    /// Reserve `seats` in one event, all or nothing.
    ///
    /// 1. every seat must lie inside the grid (`OutOfBounds` otherwise);
    /// 2. every seat must be free (`AlreadyReserved` otherwise);
    /// 3. only then is a new reservation id drawn and written to each seat.
    ///
    /// The first offending seat in request order is reported. Duplicate
    /// seats within one request are accepted and written once.
    pub fn reserve(&self, id: EventId, seats: &[Seat]) -> EmsResult<ReservationId> {
        if seats.is_empty() {
            return Err(EmsError::EmptyReservation);
        }

        let delay = self.store.delay();
        self.store.with_event(id, |event, grid| {
            delay.apply();

            let mut indices = Vec::with_capacity(seats.len());
            for &seat in seats {
                let index = event.index_of(seat).ok_or(EmsError::OutOfBounds {
                    row: seat.row,
                    col: seat.col,
                    rows: event.rows(),
                    cols: event.cols(),
                })?;
                indices.push(index);
            }

            for (&seat, &index) in seats.iter().zip(&indices) {
                if !grid.get(index).is_none() {
                    return Err(EmsError::AlreadyReserved {
                        row: seat.row,
                        col: seat.col,
                    });
                }
            }

            let reservation = grid.next_reservation();
            for index in indices {
                grid.set(index, reservation);
            }
            debug!(event = %id, reservation = %reservation, seats = seats.len(), "reserved");
            Ok(reservation)
        })
    }

    /// Copy of one event's grid, taken under its lock
    pub fn show(&self, id: EventId) -> EmsResult<GridSnapshot> {
        let delay = self.store.delay();
        self.store.with_event(id, |event, grid| {
            delay.apply();
            Ok(event.snapshot(grid))
        })
    }

    /// All event ids in insertion order; takes no event lock
    pub fn list(&self) -> Vec<EventId> {
        self.store.list()
    }
}
