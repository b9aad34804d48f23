//! Logging bootstrap
//!
//! Installs a `tracing` fmt subscriber on stderr.
//!
//! # Environment Variables
//!
//! - `RUST_LOG=<directives>` - full `EnvFilter` directives, wins when set
//! - `EMS_LOG_LEVEL=<level>` - off|error|warn|info|debug|trace or 0..=5 (default: info)
//!
//! # Usage
//!
//! ```ignore
//! ems_runtime::logging::init();
//! tracing::info!(workers = 8, "server started");
//! ```

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Env var selecting the log level
pub const LOG_LEVEL_ENV: &str = "EMS_LOG_LEVEL";

/// Parse a level name or its numeric form (0=off .. 5=trace).
pub fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_lowercase().as_str() {
        "off" | "0" => Some(LevelFilter::OFF),
        "error" | "1" => Some(LevelFilter::ERROR),
        "warn" | "2" => Some(LevelFilter::WARN),
        "info" | "3" => Some(LevelFilter::INFO),
        "debug" | "4" => Some(LevelFilter::DEBUG),
        "trace" | "5" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

/// Level from `EMS_LOG_LEVEL`; unset or unrecognized means `info`.
pub fn level_from_env() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_from_env().to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("off"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("4"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level(" WARN "), Some(LevelFilter::WARN));
        assert_eq!(parse_level("verbose"), None);
        assert_eq!(parse_level("6"), None);
    }

    #[test]
    fn test_init_twice() {
        init();
        init();
    }
}
