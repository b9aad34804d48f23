//! Identifier types for events, sessions and reservations

use core::fmt;

/// Caller-assigned identifier of an event
///
/// Unique within a store and never reused once inserted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EventId(u32);

impl EventId {
    /// Create a new EventId from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        EventId(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for EventId {
    #[inline]
    fn from(id: u32) -> Self {
        EventId(id)
    }
}

impl From<EventId> for u32 {
    #[inline]
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier of a client session
///
/// Handed out sequentially by the acceptor, starting at zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// First session identifier handed out by a fresh server
    pub const FIRST: SessionId = SessionId(0);

    #[inline]
    pub const fn new(id: u32) -> Self {
        SessionId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The identifier following this one, `None` past `u32::MAX`
    #[inline]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(SessionId(id)),
            None => None,
        }
    }
}

impl From<u32> for SessionId {
    #[inline]
    fn from(id: u32) -> Self {
        SessionId(id)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier written into every seat of one committed reservation
///
/// Numbered per event starting at 1. The value 0 marks a free seat.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ReservationId(u32);

impl ReservationId {
    /// Sentinel stored in free seats
    pub const NONE: ReservationId = ReservationId(0);

    #[inline]
    pub const fn new(id: u32) -> Self {
        ReservationId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the free-seat sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "ReservationId(NONE)")
        } else {
            write!(f, "ReservationId({})", self.0)
        }
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
