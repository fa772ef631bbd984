//! Search request decoding and validation
//!
//! The first frame a client sends on the messages socket is a JSON object:
//!
//! ```json
//! { "topicName": "orders", "startOffset": -1, "partitionId": -1, "maxResults": 100 }
//! ```
//!
//! [`SearchRequest::validate`] turns those bytes into a [`SearchRequest`] or a
//! [`RequestError`]. A `SearchRequest` can only be obtained through validation,
//! so anything holding one has already passed every field constraint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel start offset: begin at the newest messages
pub const OFFSET_NEWEST: i64 = -1;

/// Sentinel start offset: begin at the oldest retained message
pub const OFFSET_OLDEST: i64 = -2;

/// Sentinel partition id: search every partition of the topic
pub const ALL_PARTITIONS: i32 = -1;

/// Upper bound for `maxResults`
pub const MAX_RESULTS_LIMIT: u16 = 500;

/// Errors produced while reading the initial search request
#[derive(Error, Debug)]
pub enum RequestError {
    /// The frame could not be decoded as a request object
    #[error("Failed to parse list message request: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The request decoded but violates a field constraint
    #[error("Failed to validate list message request: {0}")]
    Invalid(String),
}

impl RequestError {
    /// Whether the error is a protocol-level decode failure
    pub fn is_malformed(&self) -> bool {
        matches!(self, RequestError::Malformed(_))
    }
}

/// Request frame exactly as it appears on the wire.
///
/// Absent fields fall back to zero values so that a missing topic name is
/// reported as a validation failure rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListMessagesRequest {
    pub topic_name: String,
    /// -1 for newest, -2 for oldest offset
    pub start_offset: i64,
    /// -1 for all partitions
    pub partition_id: i32,
    pub max_results: u16,
}

/// Where a search starts reading within each partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    /// The most recent messages
    Newest,
    /// The oldest retained message
    Oldest,
    /// A concrete offset
    At(i64),
}

/// Which partitions a search covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSelector {
    All,
    One(i32),
}

/// A validated, immutable search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    topic_name: String,
    start_offset: i64,
    partition_id: i32,
    max_results: u16,
}

impl SearchRequest {
    /// Decode and validate the first frame received on a connection
    pub fn validate(raw: &[u8]) -> Result<Self, RequestError> {
        let wire: ListMessagesRequest =
            serde_json::from_slice(raw).map_err(RequestError::Malformed)?;
        Self::try_from(wire)
    }

    /// Build a request from typed fields, applying the same constraints as
    /// [`SearchRequest::validate`]
    pub fn new(
        topic_name: impl Into<String>,
        start_offset: i64,
        partition_id: i32,
        max_results: u16,
    ) -> Result<Self, RequestError> {
        Self::try_from(ListMessagesRequest {
            topic_name: topic_name.into(),
            start_offset,
            partition_id,
            max_results,
        })
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Raw start offset, including the -1/-2 sentinels
    pub fn start_offset(&self) -> i64 {
        self.start_offset
    }

    pub fn start(&self) -> StartOffset {
        match self.start_offset {
            OFFSET_NEWEST => StartOffset::Newest,
            OFFSET_OLDEST => StartOffset::Oldest,
            offset => StartOffset::At(offset),
        }
    }

    /// Raw partition id, including the -1 sentinel
    pub fn partition_id(&self) -> i32 {
        self.partition_id
    }

    pub fn partitions(&self) -> PartitionSelector {
        match self.partition_id {
            ALL_PARTITIONS => PartitionSelector::All,
            id => PartitionSelector::One(id),
        }
    }

    pub fn max_results(&self) -> u16 {
        self.max_results
    }
}

impl TryFrom<ListMessagesRequest> for SearchRequest {
    type Error = RequestError;

    fn try_from(req: ListMessagesRequest) -> Result<Self, Self::Error> {
        if req.topic_name.is_empty() {
            return Err(RequestError::Invalid("topic name is required".to_string()));
        }

        if req.start_offset < OFFSET_OLDEST {
            return Err(RequestError::Invalid(
                "start offset is smaller than -2".to_string(),
            ));
        }

        if req.partition_id < ALL_PARTITIONS {
            return Err(RequestError::Invalid(
                "partitionID is smaller than -1".to_string(),
            ));
        }

        if req.max_results == 0 || req.max_results > MAX_RESULTS_LIMIT {
            return Err(RequestError::Invalid(format!(
                "max results must be between 1 and {}",
                MAX_RESULTS_LIMIT
            )));
        }

        Ok(Self {
            topic_name: req.topic_name,
            start_offset: req.start_offset,
            partition_id: req.partition_id,
            max_results: req.max_results,
        })
    }
}
