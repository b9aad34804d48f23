//! # ems-core
//!
//! Core types for the EMS event reservation server.
//!
//! This crate is platform-agnostic and performs no channel I/O of its own;
//! the codec works over any `Read`/`Write`. FIFO transport, the worker pool
//! and the server lifecycle live in `ems-runtime`.
//!
//! ## Modules
//!
//! - `id` - Event, session and reservation identifiers
//! - `event` - Seats, events and grid snapshots
//! - `store` - Event store (store lock + per-event locks)
//! - `engine` - Reservation engine
//! - `delay` - Artificial state-access delay
//! - `sync` - Counting semaphore
//! - `buffer` - Session buffer (bounded hand-off)
//! - `protocol` - Wire protocol codec
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod id;
pub mod event;
pub mod store;
pub mod engine;
pub mod delay;
pub mod sync;
pub mod buffer;
pub mod protocol;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use id::{EventId, ReservationId, SessionId};
pub use event::{Event, GridSnapshot, Seat, SeatGrid};
pub use store::EventStore;
pub use engine::ReservationEngine;
pub use delay::StateAccessDelay;
pub use sync::Semaphore;
pub use buffer::SessionBuffer;
pub use protocol::{OpCode, ProtocolError, Request, Response, SetupFramer, SetupRequest, Status};
pub use error::{EmsError, EmsResult};
pub use env::{env_get, env_get_opt};

/// Protocol and sizing constants
pub mod constants {
    /// Width of each path field in the SETUP frame, NUL-padded
    pub const MAX_PIPE_PATH_LEN: usize = 256;

    /// Opcode byte plus two path fields
    pub const SETUP_FRAME_LEN: usize = 1 + 2 * MAX_PIPE_PATH_LEN;

    /// Default worker pool size and session buffer capacity
    pub const MAX_SESSION_COUNT: usize = 8;

    /// Upper bound for a configured pool size
    pub const MAX_WORKERS: usize = 64;

    /// Default artificial state-access delay in microseconds
    pub const STATE_ACCESS_DELAY_US: u32 = 10;

    /// Maximum seats in one RESERVE frame
    pub const MAX_RESERVATION_SIZE: usize = 256;

    /// Maximum `rows * cols` of one event
    pub const MAX_EVENT_SEATS: usize = 1 << 20;
}
