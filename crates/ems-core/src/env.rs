//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment variables with defaults.
//!
//! # Usage
//!
//! ```ignore
//! use ems_core::env::{env_get, env_get_opt};
//!
//! let workers: usize = env_get("EMS_POOL_SIZE", 8);
//! let delay_us: u32 = env_get("EMS_STATE_ACCESS_DELAY_US", 10);
//! let explicit_delay: Option<u32> = env_get_opt("EMS_STATE_ACCESS_DELAY_US");
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
