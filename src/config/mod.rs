//! Configuration module for Topicscope
//!
//! This module is organized into submodules:
//! - `defaults` - Default constants and values
//! - `args` - CLI argument definitions
//! - `file` - TOML configuration file
//! - `merge` - Merging file values under CLI arguments

mod args;
mod defaults;
pub mod file;
mod merge;

pub use args::ServerArgs;
pub use defaults::*;
pub use file::ConfigFile;
pub use merge::merge_config_with_args;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConsoleError, Result};
use defaults::DEFAULT_HTTP_SOCKET_ADDR;

/// Complete server configuration for Topicscope.
///
/// # Configuration Sources
///
/// Configuration is loaded from multiple sources with this precedence:
/// 1. **CLI arguments** (highest priority)
/// 2. **Environment variables** - `TOPICSCOPE_*` prefix
/// 3. **Config file** - TOML configuration file
/// 4. **Built-in defaults** (lowest priority)
///
/// # Generating Example Config
///
/// ```bash
/// topicscope --generate-config > topicscope.toml
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on for the HTTP/WebSocket API
    pub http_addr: SocketAddr,

    /// Log level
    pub log_level: String,

    pub search: SearchConfig,

    pub frontend: FrontendConfig,

    /// Topics, or `prefix*` patterns, the console may not read
    pub denied_topics: Vec<String>,

    /// Seed the in-memory store with demo topics
    pub demo: bool,

    /// Time to wait for open connections during shutdown
    pub drain_timeout: Duration,
}

/// Settings for the streaming message search socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Upper bound on a single search
    pub deadline: Duration,
    /// Largest accepted inbound frame
    pub max_request_bytes: usize,
    /// How long the connection lingers after the close frame
    pub close_flush: Duration,
    /// Events queued per connection before producers wait
    pub event_buffer: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(DEFAULT_SEARCH_DEADLINE_MS),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            close_flush: Duration::from_millis(DEFAULT_CLOSE_FLUSH_MS),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_FRONTEND_ENABLED,
            path: PathBuf::from(DEFAULT_FRONTEND_PATH),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_SOCKET_ADDR,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            search: SearchConfig::default(),
            frontend: FrontendConfig::default(),
            denied_topics: Vec::new(),
            demo: DEFAULT_DEMO_ENABLED,
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Build a configuration from parsed (and already merged) arguments
    pub fn from_args(args: ServerArgs) -> Result<Self> {
        let http_addr: SocketAddr = args
            .http_addr
            .parse()
            .map_err(|e| ConsoleError::Config(format!("Invalid HTTP address: {}", e)))?;

        let denied_topics = args
            .denied_topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let config = Self {
            http_addr,
            log_level: args.log_level,
            search: SearchConfig {
                deadline: Duration::from_millis(args.search_deadline_ms),
                max_request_bytes: args.max_request_bytes,
                close_flush: Duration::from_millis(args.close_flush_ms),
                event_buffer: args.event_buffer,
            },
            frontend: FrontendConfig {
                enabled: args.frontend_enabled,
                path: args.frontend_path,
            },
            denied_topics,
            demo: args.demo,
            drain_timeout: Duration::from_secs(args.drain_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.http_addr.port() == 0 {
            return Err(ConsoleError::Config(
                "HTTP listen port must be between 1 and 65535".to_string(),
            ));
        }

        if self.search.deadline.is_zero() {
            return Err(ConsoleError::Config(
                "Search deadline must be greater than zero".to_string(),
            ));
        }

        if self.search.max_request_bytes < MIN_MAX_REQUEST_BYTES {
            return Err(ConsoleError::Config(format!(
                "max_request_bytes must be at least {} (got {})",
                MIN_MAX_REQUEST_BYTES, self.search.max_request_bytes
            )));
        }

        if self.search.event_buffer == 0 {
            return Err(ConsoleError::Config(
                "event_buffer must be greater than zero".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConsoleError::Config(format!(
                "Invalid log level '{}', expected one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.search.close_flush > self.search.deadline {
            tracing::warn!(
                close_flush_ms = self.search.close_flush.as_millis() as u64,
                deadline_ms = self.search.deadline.as_millis() as u64,
                "Close flush delay is longer than the search deadline"
            );
        }

        Ok(())
    }
}
