//! Wire events sent from server to client during a message search
//!
//! Every server frame is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "phase",   "phase": "Get Partitions" }
//! { "type": "message", "message": { "partitionId": 0, "offset": 12, ... } }
//! { "type": "done",    "elapsedMs": 81.4, "isCancelled": false }
//! { "type": "error",   "message": "You don't have permissions to view messages in that topic" }
//! ```
//!
//! A search produces any number of `phase`/`message` events followed by
//! exactly one terminal event (`done` or `error`).

use serde::{Deserialize, Serialize};

/// A single Kafka record as presented to the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    /// Topic name
    pub topic: String,
    /// Partition ID
    pub partition_id: i32,
    /// Record offset
    pub offset: i64,
    /// Record timestamp (milliseconds)
    pub timestamp: i64,
    /// Record key (if present)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Record value, JSON when it parses as JSON, a string otherwise
    pub value: serde_json::Value,
    /// Record headers, in record order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<MessageHeader>,
    /// Size of key plus value in bytes
    pub size: usize,
}

/// A record header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub key: String,
    pub value: String,
}

impl TopicMessage {
    /// Build a message from raw key/value bytes
    pub fn from_raw(
        topic: &str,
        partition_id: i32,
        offset: i64,
        timestamp: i64,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Self {
        let decoded = match serde_json::from_slice(value) {
            Ok(v) => v,
            Err(_) => serde_json::Value::String(String::from_utf8_lossy(value).to_string()),
        };

        Self {
            topic: topic.to_string(),
            partition_id,
            offset,
            timestamp,
            key: key.map(|k| String::from_utf8_lossy(k).to_string()),
            value: decoded,
            headers: Vec::new(),
            size: key.map_or(0, <[u8]>::len) + value.len(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(MessageHeader {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

/// Progress event emitted during a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Search-stage transition marker
    Phase { phase: String },
    /// One retrieved record
    Message { message: TopicMessage },
    /// Search finished (terminal)
    #[serde(rename_all = "camelCase")]
    Done { elapsed_ms: f64, is_cancelled: bool },
    /// Search could not be completed (terminal)
    Error { message: String },
}

impl ProgressEvent {
    pub fn phase(name: impl Into<String>) -> Self {
        ProgressEvent::Phase { phase: name.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the search
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Done { .. } | ProgressEvent::Error { .. })
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Phase { .. } => "phase",
            ProgressEvent::Message { .. } => "message",
            ProgressEvent::Done { .. } => "done",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Encode the event into a text frame
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        Ok(Frame {
            text: serde_json::to_string(self)?,
            compress: matches!(self, ProgressEvent::Message { .. }),
        })
    }
}

/// An encoded event ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// JSON text of the event
    pub text: String,
    /// Compression hint: only the high-volume `message` path asks for
    /// per-message compression, control events go out uncompressed
    pub compress: bool,
}
