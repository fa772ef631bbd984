//! Progress sink: how a running search reports back to the client
//!
//! A producer may report from several workers at once (typically one per
//! partition). Rather than locking the socket for every write, every
//! [`EventSink`] emission is pushed into one bounded queue and a single writer
//! ([`write_events`]) drains it onto the transport. The queue gives a total
//! order of frames, and a frame is always written in one piece.
//!
//! Terminal events (`done`/`error`) are accepted at most once. Anything
//! emitted after the terminal event is rejected by the sink, and the writer
//! stops at the first terminal frame, so nothing can reach the wire after it.

use crate::search::event::{ProgressEvent, TopicMessage};
use async_trait::async_trait;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Errors returned to a producer that emits when it should not
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// A terminal event was already emitted for this search
    #[error("search already terminated")]
    Terminated,
    /// The connection writer is gone
    #[error("connection closed")]
    Closed,
}

/// Capability handed to a producer for reporting search progress
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Report a search-stage transition
    async fn emit_phase(&self, name: &str) -> Result<(), SinkError>;

    /// Report one retrieved record
    async fn emit_message(&self, message: TopicMessage) -> Result<(), SinkError>;

    /// Finish the search successfully (terminal)
    async fn emit_done(&self, elapsed_ms: f64, cancelled: bool) -> Result<(), SinkError>;

    /// Finish the search with an error (terminal)
    async fn emit_error(&self, message: &str) -> Result<(), SinkError>;
}

/// Queue-backed [`ProgressSink`] feeding a single connection writer
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<ProgressEvent>,
    terminated: AtomicBool,
    messages: AtomicU64,
}

impl EventSink {
    /// Create a sink and the receiving end to hand to [`write_events`]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                tx,
                terminated: AtomicBool::new(false),
                messages: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Whether a terminal event has been accepted
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Number of `message` events accepted so far
    pub fn messages_emitted(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    async fn push(&self, event: ProgressEvent) -> Result<(), SinkError> {
        if self.is_terminated() {
            trace!(kind = event.kind(), "Dropping event emitted after terminal event");
            return Err(SinkError::Terminated);
        }
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }

    async fn push_terminal(&self, event: ProgressEvent) -> Result<(), SinkError> {
        if self
            .terminated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(kind = event.kind(), "Rejected second terminal event for search");
            return Err(SinkError::Terminated);
        }
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl ProgressSink for EventSink {
    async fn emit_phase(&self, name: &str) -> Result<(), SinkError> {
        self.push(ProgressEvent::phase(name)).await
    }

    async fn emit_message(&self, message: TopicMessage) -> Result<(), SinkError> {
        self.push(ProgressEvent::Message { message }).await?;
        self.messages.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn emit_done(&self, elapsed_ms: f64, cancelled: bool) -> Result<(), SinkError> {
        self.push_terminal(ProgressEvent::Done {
            elapsed_ms,
            is_cancelled: cancelled,
        })
        .await
    }

    async fn emit_error(&self, message: &str) -> Result<(), SinkError> {
        self.push_terminal(ProgressEvent::error(message)).await
    }
}

/// Summary of what the writer put on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOutcome {
    /// Frames successfully written
    pub frames_written: u64,
    /// Wire name of the terminal event written, if any
    pub terminal: Option<&'static str>,
    /// Whether a transport write failed
    pub write_failed: bool,
}

/// Drain queued events onto the transport until the terminal event is
/// written, the queue closes, or a write fails.
///
/// axum's WebSocket does not negotiate permessage-deflate, so the frame's
/// compression hint only shows up in trace output here.
pub async fn write_events<S>(mut rx: mpsc::Receiver<ProgressEvent>, transport: &mut S) -> WriterOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut outcome = WriterOutcome::default();

    while let Some(event) = rx.recv().await {
        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = event.kind(), error = %e, "Failed to encode progress event");
                continue;
            }
        };

        trace!(kind = event.kind(), bytes = frame.text.len(), compress = frame.compress, "Writing frame");
        if let Err(e) = transport.send(Message::Text(frame.text)).await {
            debug!(kind = event.kind(), error = %e, "Failed to write frame to websocket");
            outcome.write_failed = true;
            break;
        }
        outcome.frames_written += 1;

        if event.is_terminal() {
            outcome.terminal = Some(event.kind());
            break;
        }
    }

    // Closing the queue makes late emissions fail with `SinkError::Closed`
    rx.close();
    outcome
}
