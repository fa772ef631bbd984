//! Configuration file support for Topicscope
//!
//! This module provides TOML configuration file parsing and merging with CLI arguments.
//!
//! ## Priority Order
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values
//!
//! ## Example Configuration
//!
//! ```toml
//! # topicscope.toml
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//! log_level = "info"
//!
//! [search]
//! deadline_ms = 18000
//! max_request_bytes = 16384
//!
//! [authorization]
//! denied_topics = ["_internal*"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConsoleError, Result};

/// Root configuration structure for TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server configuration
    pub server: ServerSection,

    /// Message search configuration
    pub search: SearchSection,

    /// Frontend configuration
    pub frontend: FrontendSection,

    /// Topic authorization configuration
    pub authorization: AuthorizationSection,

    /// Demo data configuration
    pub demo: DemoSection,

    /// Shutdown configuration
    pub shutdown: ShutdownSection,
}

/// Server section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// HTTP/WebSocket listen address
    pub http_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Search section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub deadline_ms: Option<u64>,
    pub max_request_bytes: Option<usize>,
    pub close_flush_ms: Option<u64>,
    pub event_buffer: Option<usize>,
}

/// Frontend section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendSection {
    pub enabled: Option<bool>,
    pub path: Option<PathBuf>,
}

/// Authorization section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationSection {
    /// Topic names, or `prefix*` patterns, whose messages may not be viewed
    pub denied_topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSection {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSection {
    /// Connection drain timeout in seconds
    pub drain_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            ConsoleError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Try to load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./topicscope.toml
    /// 2. /etc/topicscope/topicscope.toml
    /// 3. ~/.config/topicscope/topicscope.toml
    pub fn load_default() -> Option<Self> {
        let default_paths = [
            PathBuf::from("topicscope.toml"),
            PathBuf::from("/etc/topicscope/topicscope.toml"),
            dirs::config_dir()
                .map(|p| p.join("topicscope/topicscope.toml"))
                .unwrap_or_default(),
        ];

        for path in default_paths.iter().filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {:?}", path);
                        return Some(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        None
    }

    /// Generate an example configuration file
    pub fn generate_example() -> String {
        r#"# Topicscope Configuration File
# Copy to topicscope.toml and customize as needed
#
# Configuration priority (highest to lowest):
# 1. Command-line arguments
# 2. Environment variables
# 3. This configuration file
# 4. Default values

[server]
# HTTP/WebSocket listen address
http_addr = "0.0.0.0:8080"

# Log level (trace, debug, info, warn, error)
log_level = "info"

[search]
# Upper bound on a single message search in milliseconds
deadline_ms = 18000

# Largest accepted search request frame in bytes
max_request_bytes = 16384

# Time the connection stays open after the close frame, in milliseconds
close_flush_ms = 2000

# Progress events queued per connection before producers wait
event_buffer = 1024

[frontend]
# Serve the single-page application
enabled = true

# Directory containing index.html and the built assets
path = "./build"

[authorization]
# Topics whose messages may not be viewed. A trailing * matches a prefix.
denied_topics = []

[demo]
# Seed the in-memory store with demo topics
enabled = false

[shutdown]
# Time to wait for open message sockets during shutdown, in seconds
drain_timeout_secs = 10
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert!(config.server.http_addr.is_none());
        assert!(config.authorization.denied_topics.is_none());
    }

    #[test]
    fn test_parse_search_section() {
        let toml = r#"
            [search]
            deadline_ms = 5000
            max_request_bytes = 4096
        "#;
        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.search.deadline_ms, Some(5000));
        assert_eq!(config.search.max_request_bytes, Some(4096));
        assert!(config.search.close_flush_ms.is_none());
    }

    #[test]
    fn test_parse_authorization_section() {
        let toml = r#"
            [authorization]
            denied_topics = ["secrets", "_internal*"]
        "#;
        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(
            config.authorization.denied_topics,
            Some(vec!["secrets".to_string(), "_internal*".to_string()])
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlog_level = \"debug\"\n[demo]\nenabled = true").unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.server.log_level.as_deref(), Some("debug"));
        assert_eq!(config.demo.enabled, Some(true));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\ndeadline_ms = \"soon\"").unwrap();

        let err = ConfigFile::load(file.path()).unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));

        let err = ConfigFile::load("/nonexistent/topicscope.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_generate_example_is_valid_toml() {
        let example = ConfigFile::generate_example();
        let config: ConfigFile = toml::from_str(&example).unwrap();
        assert_eq!(config.search.deadline_ms, Some(18000));
        assert_eq!(config.authorization.denied_topics, Some(vec![]));
    }
}
