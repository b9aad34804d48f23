//! Compile-time defaults for [`ServerConfig`](super::ServerConfig)

use ems_core::constants;

/// Worker count, also the session buffer capacity
pub const POOL_SIZE: usize = constants::MAX_SESSION_COUNT;

/// Artificial state-access delay in microseconds
pub const STATE_ACCESS_DELAY_US: u32 = constants::STATE_ACCESS_DELAY_US;

/// Largest accepted pool size
pub const MAX_POOL_SIZE: usize = constants::MAX_WORKERS;
