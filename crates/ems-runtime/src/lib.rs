//! # ems-runtime
//!
//! Unix runtime for the EMS reservation server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Server                     │
//! ├──────────────┬──────────────────────────────┤
//! │  Acceptor    │  WorkerPool (N OS threads)   │
//! │  (1 thread)  │  handshake + Session loop    │
//! ├──────────────┴──────────────────────────────┤
//! │       SessionBuffer (capacity N)            │
//! ├─────────────────────────────────────────────┤
//! │   FIFO transport (mkfifo / open / unlink)   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config` - Server configuration (defaults + env overrides)
//! - `logging` - tracing subscriber bootstrap
//! - `fifo` - Named-pipe transport
//! - `acceptor` - Registration accept loop
//! - `session` - Handshake and per-session command loop
//! - `worker` - Worker pool
//! - `server` - Assembly and shutdown
//! - `error` - Lifecycle errors

pub mod config;
pub mod logging;
pub mod fifo;
pub mod acceptor;
pub mod session;
pub mod worker;
pub mod server;
pub mod error;

pub use config::{ConfigError, ServerConfig};
pub use acceptor::{Acceptor, Admission, Listener, PendingConnection};
pub use fifo::{FifoListener, FifoWaker};
pub use session::{EndReason, Session};
pub use worker::WorkerPool;
pub use server::Server;
pub use error::{ServerError, ServerResult};
