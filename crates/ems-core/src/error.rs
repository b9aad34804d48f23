//! Error types for the event management server

use std::io;

use thiserror::Error;

use crate::id::EventId;
use crate::protocol::ProtocolError;

/// Result type for store, engine and session operations
pub type EmsResult<T> = Result<T, EmsError>;

/// Errors that can occur while serving a request
#[derive(Debug, Error)]
pub enum EmsError {
    /// `create` on an id that is already live
    #[error("event {0} already exists")]
    AlreadyExists(EventId),

    /// Reference to an unknown event id
    #[error("event {0} not found")]
    NotFound(EventId),

    /// Seat coordinate outside `[1, rows] x [1, cols]`
    #[error("seat ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Requested seat already holds a reservation
    #[error("seat ({row}, {col}) is already reserved")]
    AlreadyReserved { row: usize, col: usize },

    /// Grid with a zero side or more seats than an event may hold
    #[error("invalid grid dimensions {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    /// Reservation naming no seats
    #[error("reservation must name at least one seat")]
    EmptyReservation,

    /// Transport read/write/open failure
    #[error("channel error: {0}")]
    Channel(#[from] io::Error),

    /// Unreadable or unexpected frame
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl EmsError {
    /// True for failures of a single request that leave the session usable.
    ///
    /// These are answered with a FAILURE status. Everything else
    /// (`Channel`, `Protocol`) ends the session.
    pub fn is_request_failure(&self) -> bool {
        !matches!(self, EmsError::Channel(_) | EmsError::Protocol(_))
    }
}
