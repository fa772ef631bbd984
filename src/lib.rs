#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Topicscope
//!
//! Topicscope is a Kafka console backend. Its core is a streaming message
//! search: a browser opens a WebSocket, sends one search request, and
//! receives progress phases, matching messages and a single terminal event
//! while the search runs.
//!
//! ## Running the Server
//!
//! ```bash
//! # Run with defaults (listens on 0.0.0.0:8080, serves ./build)
//! $ ./topicscope
//!
//! # Demo topics, no frontend
//! $ ./topicscope --demo --frontend-enabled false
//!
//! # Hide internal topics from the message viewer
//! $ ./topicscope --denied-topics '_internal*,secrets'
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use topicscope::{Result, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut config = ServerConfig::default();
//!     config.demo = true;
//!     config.frontend.enabled = false;
//!
//!     let server = Server::new(config)?;
//!     server.run().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`search`] - request validation, wire events, progress sink, orchestration
//! - [`server`] - HTTP router, messages socket lifecycle, frontend, shutdown
//! - [`storage`] - in-memory topic store used as the default producer
//! - [`config`] - CLI arguments, configuration file, defaults

pub mod config;
pub mod error;
pub mod search;
pub mod server;
pub mod storage;

pub use config::{ServerArgs, ServerConfig};
pub use error::{ConsoleError, Result};
pub use search::{
    MessageSearcher, ProgressEvent, ProgressSink, SearchOrchestrator, SearchRequest,
    TopicAuthorizer, TopicMessage,
};
pub use server::Server;
pub use storage::MemoryTopicStore;
