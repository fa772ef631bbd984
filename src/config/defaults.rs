//! Default constants for Topicscope configuration
//!
//! These constants define the default values used throughout the configuration
//! system when no explicit value is provided.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default listen address for the HTTP/WebSocket API
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default HTTP socket address (const, no parsing needed)
pub(crate) const DEFAULT_HTTP_SOCKET_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080);

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default upper bound on a single message search (18 seconds)
pub const DEFAULT_SEARCH_DEADLINE_MS: u64 = 18_000;

/// Default maximum size of an inbound messages-socket frame (16 KiB)
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 16 * 1024;

/// Smallest accepted value for the inbound frame limit
pub const MIN_MAX_REQUEST_BYTES: usize = 256;

/// Default time the connection stays open after the close frame (2 seconds)
pub const DEFAULT_CLOSE_FLUSH_MS: u64 = 2_000;

/// Default number of progress events queued per connection
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Default frontend serving state
pub const DEFAULT_FRONTEND_ENABLED: bool = true;

/// Default frontend build directory
pub const DEFAULT_FRONTEND_PATH: &str = "./build";

/// Default demo mode state
pub const DEFAULT_DEMO_ENABLED: bool = false;

/// Default connection drain timeout in seconds
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

/// Accepted log levels
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_http_addr_matches_const() {
        let parsed: SocketAddr = DEFAULT_HTTP_ADDR.parse().unwrap();
        assert_eq!(parsed, DEFAULT_HTTP_SOCKET_ADDR);
    }

    #[test]
    fn test_default_log_level_is_valid() {
        assert!(VALID_LOG_LEVELS.contains(&DEFAULT_LOG_LEVEL));
        assert!(DEFAULT_MAX_REQUEST_BYTES >= MIN_MAX_REQUEST_BYTES);
    }
}
