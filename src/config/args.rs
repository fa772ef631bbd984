//! Command-line arguments for the Topicscope server
//!
//! This module defines the CLI arguments structure using clap.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use super::defaults::*;

/// Command-line arguments for the Topicscope server
#[derive(Parser, Debug, Clone)]
#[command(name = "topicscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kafka console backend with a streaming message search API")]
pub struct ServerArgs {
    /// Path to configuration file (TOML format)
    /// If not specified, looks for topicscope.toml in current directory,
    /// /etc/topicscope/, or ~/.config/topicscope/
    #[arg(short, long, env = "TOPICSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Generate example configuration file and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Address to listen on for the HTTP/WebSocket API
    #[arg(long, env = "TOPICSCOPE_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    pub http_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TOPICSCOPE_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Upper bound on a single message search in milliseconds.
    /// The search is cancelled and reported as done when it elapses.
    #[arg(long, env = "TOPICSCOPE_SEARCH_DEADLINE_MS", default_value_t = DEFAULT_SEARCH_DEADLINE_MS)]
    pub search_deadline_ms: u64,

    /// Maximum size of the search request frame in bytes
    #[arg(long, env = "TOPICSCOPE_MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,

    /// Time in milliseconds a connection is held open after the close frame
    #[arg(long, env = "TOPICSCOPE_CLOSE_FLUSH_MS", default_value_t = DEFAULT_CLOSE_FLUSH_MS)]
    pub close_flush_ms: u64,

    /// Number of progress events queued per connection before producers wait
    #[arg(long, env = "TOPICSCOPE_EVENT_BUFFER", default_value_t = DEFAULT_EVENT_BUFFER)]
    pub event_buffer: usize,

    /// Serve the frontend single-page application
    #[arg(long, env = "TOPICSCOPE_FRONTEND_ENABLED", default_value_t = DEFAULT_FRONTEND_ENABLED, action = ArgAction::Set)]
    pub frontend_enabled: bool,

    /// Directory containing the frontend build (index.html and assets)
    #[arg(long, env = "TOPICSCOPE_FRONTEND_PATH", default_value = DEFAULT_FRONTEND_PATH)]
    pub frontend_path: PathBuf,

    /// Topics whose messages may not be viewed (comma separated).
    /// A trailing `*` denies every topic with that prefix.
    #[arg(long, env = "TOPICSCOPE_DENIED_TOPICS", value_delimiter = ',')]
    pub denied_topics: Vec<String>,

    /// Seed the in-memory store with demo topics
    #[arg(long, env = "TOPICSCOPE_DEMO")]
    pub demo: bool,

    /// Time to wait for open message sockets to finish during shutdown
    #[arg(long, env = "TOPICSCOPE_DRAIN_TIMEOUT_SECS", default_value_t = DEFAULT_DRAIN_TIMEOUT_SECS)]
    pub drain_timeout_secs: u64,
}
