//! Events and their seat grids
//!
//! An [`Event`] is an independently lockable record: its dimensions are
//! fixed at creation, and the mutable part ([`SeatGrid`]) lives behind the
//! event's own mutex. Nothing outside this crate touches the grid without
//! going through that lock.

use parking_lot::{Mutex, MutexGuard};

use crate::constants::MAX_EVENT_SEATS;
use crate::error::{EmsError, EmsResult};
use crate::id::{EventId, ReservationId};

/// One seat coordinate, 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seat {
    pub row: usize,
    pub col: usize,
}

impl Seat {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Seat { row, col }
    }
}

impl From<(usize, usize)> for Seat {
    fn from((row, col): (usize, usize)) -> Self {
        Seat { row, col }
    }
}

/// Mutable state of one event, guarded by the event lock
#[derive(Debug)]
pub struct SeatGrid {
    /// Row-major cells; `ReservationId::NONE` marks a free seat
    seats: Vec<ReservationId>,
    /// Last reservation id handed out for this event
    reservations: u32,
}

impl SeatGrid {
    fn new(cells: usize) -> Self {
        Self {
            seats: vec![ReservationId::NONE; cells],
            reservations: 0,
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> ReservationId {
        self.seats[index]
    }

    #[inline]
    pub(crate) fn set(&mut self, index: usize, id: ReservationId) {
        self.seats[index] = id;
    }

    /// Bump the per-event counter and return the new reservation id
    pub(crate) fn next_reservation(&mut self) -> ReservationId {
        self.reservations += 1;
        ReservationId::new(self.reservations)
    }

    pub fn reservations(&self) -> u32 {
        self.reservations
    }

    pub(crate) fn raw(&self) -> Vec<u32> {
        self.seats.iter().map(|s| s.as_u32()).collect()
    }
}

/// A seating grid with independent reservation state
#[derive(Debug)]
pub struct Event {
    id: EventId,
    rows: usize,
    cols: usize,
    state: Mutex<SeatGrid>,
}

impl Event {
    /// Allocate a zeroed `rows x cols` event.
    ///
    /// Both sides must be non-zero and the grid must not exceed
    /// [`MAX_EVENT_SEATS`] cells.
    pub fn new(id: EventId, rows: usize, cols: usize) -> EmsResult<Self> {
        let cells = rows
            .checked_mul(cols)
            .filter(|&n| n > 0 && n <= MAX_EVENT_SEATS)
            .ok_or(EmsError::InvalidDimensions { rows, cols })?;

        Ok(Self {
            id,
            rows,
            cols,
            state: Mutex::new(SeatGrid::new(cells)),
        })
    }

    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major index of an in-bounds seat
    #[inline]
    pub fn index_of(&self, seat: Seat) -> Option<usize> {
        if self.contains(seat) {
            Some((seat.row - 1) * self.cols + seat.col - 1)
        } else {
            None
        }
    }

    #[inline]
    pub fn contains(&self, seat: Seat) -> bool {
        (1..=self.rows).contains(&seat.row) && (1..=self.cols).contains(&seat.col)
    }

    /// Acquire the event lock
    pub fn lock(&self) -> MutexGuard<'_, SeatGrid> {
        self.state.lock()
    }

    /// Copy the grid out. Must be called with the lock held.
    pub fn snapshot(&self, grid: &SeatGrid) -> GridSnapshot {
        GridSnapshot {
            rows: self.rows,
            cols: self.cols,
            seats: grid.raw(),
        }
    }
}

/// Copy of one event's grid taken under its lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    pub rows: usize,
    pub cols: usize,
    /// Row-major reservation ids, `rows * cols` long
    pub seats: Vec<u32>,
}

impl GridSnapshot {
    /// Seat value at a 1-indexed coordinate
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        if row == 0 || col == 0 || row > self.rows || col > self.cols {
            return None;
        }
        self.seats.get((row - 1) * self.cols + col - 1).copied()
    }

    /// Iterate the grid one row at a time
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.seats.chunks(self.cols.max(1))
    }

    /// True when no seat holds a reservation
    pub fn is_vacant(&self) -> bool {
        self.seats.iter().all(|&s| s == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_is_zeroed() {
        let event = Event::new(EventId::new(1), 3, 4).unwrap();
        let grid = event.lock();
        let snap = event.snapshot(&grid);
        assert_eq!(snap.seats.len(), 12);
        assert!(snap.is_vacant());
        assert_eq!(grid.reservations(), 0);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            Event::new(EventId::new(1), 0, 4),
            Err(EmsError::InvalidDimensions { rows: 0, cols: 4 })
        ));
        assert!(Event::new(EventId::new(1), usize::MAX, 2).is_err());
        assert!(Event::new(EventId::new(1), MAX_EVENT_SEATS + 1, 1).is_err());
    }

    #[test]
    fn test_index_of() {
        let event = Event::new(EventId::new(1), 2, 3).unwrap();
        assert_eq!(event.index_of(Seat::new(1, 1)), Some(0));
        assert_eq!(event.index_of(Seat::new(2, 3)), Some(5));
        assert_eq!(event.index_of(Seat::new(0, 1)), None);
        assert_eq!(event.index_of(Seat::new(3, 1)), None);
        assert_eq!(event.index_of(Seat::new(1, 4)), None);
    }

    #[test]
    fn test_snapshot_accessors() {
        let snap = GridSnapshot { rows: 2, cols: 2, seats: vec![1, 0, 0, 1] };
        assert_eq!(snap.get(1, 1), Some(1));
        assert_eq!(snap.get(2, 1), Some(0));
        assert_eq!(snap.get(3, 1), None);
        let rows: Vec<&[u32]> = snap.rows().collect();
        assert_eq!(rows, vec![&[1, 0][..], &[0, 1][..]]);
        assert!(!snap.is_vacant());
    }
}
