//! Streaming message search
//!
//! The pieces behind the messages socket, leaves first:
//!
//! - `request` - decoding and validating the client's search request
//! - `event` - the `phase`/`message`/`done`/`error` wire events
//! - `sink` - the progress sink producers report through, and the single
//!   writer that puts events on the wire
//! - `session` - per-connection cancellation and sink ownership
//! - `orchestrator` - authorization, deadline, producer and terminal event
//!
//! `authorizer` and `producer` define the two collaborators the orchestrator
//! drives.

pub mod authorizer;
pub mod event;
pub mod orchestrator;
pub mod producer;
pub mod request;
pub mod session;
pub mod sink;

pub use authorizer::{AllowAllAuthorizer, TopicAuthorizer, TopicDenyList};
pub use event::{Frame, MessageHeader, ProgressEvent, TopicMessage};
pub use orchestrator::{SearchOrchestrator, SearchOutcome, DEFAULT_SEARCH_DEADLINE, PERMISSION_DENIED_MESSAGE};
pub use producer::MessageSearcher;
pub use request::{PartitionSelector, RequestError, SearchRequest, StartOffset};
pub use session::SearchSession;
pub use sink::{write_events, EventSink, ProgressSink, SinkError, WriterOutcome};
