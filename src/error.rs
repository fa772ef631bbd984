//! Error types for Topicscope
//!
//! This module defines the crate-wide error type. Component-local failures
//! (request validation, progress sink misuse) have their own error enums in
//! their modules and convert into [`ConsoleError`] where they cross a module
//! boundary.

use thiserror::Error;

/// Result type alias for Topicscope operations
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Main error type for Topicscope
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Partition not found: topic={0}, partition={1}")]
    PartitionNotFound(String, i32),

    #[error("Authorization check failed: {0}")]
    Authorization(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Request error: {0}")]
    Request(#[from] crate::search::RequestError),

    #[error("Progress sink error: {0}")]
    Sink(#[from] crate::search::SinkError),
}

impl ConsoleError {
    /// Message suitable for a wire `error` event.
    ///
    /// Internal variants (IO, server) are not echoed verbatim to the client.
    pub fn client_message(&self) -> String {
        match self {
            ConsoleError::Io(_) | ConsoleError::Server(_) => {
                "Internal server error while searching messages".to_string()
            }
            other => other.to_string(),
        }
    }
}
