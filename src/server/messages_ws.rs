//! Streaming message search over WebSocket
//!
//! ## Endpoint
//!
//! - `GET /api/topics/:topicName/messages` - upgrade into a one-shot search
//!
//! ## Protocol
//!
//! The client sends exactly one request frame:
//! ```json
//! { "topicName": "orders", "startOffset": -1, "partitionId": -1, "maxResults": 50 }
//! ```
//!
//! The server answers with zero or more `phase` and `message` frames followed
//! by exactly one `done` or `error` frame, then closes the connection:
//! ```json
//! { "type": "phase", "phase": "Consuming messages" }
//! { "type": "message", "message": { "partitionId": 0, "offset": 12, ... } }
//! { "type": "done", "elapsedMs": 41.7, "isCancelled": false }
//! ```
//!
//! Further client frames are ignored while streaming. A client close at any
//! point cancels the running search. A client that sends no request within
//! the search deadline is disconnected, and one that stops reading is dropped
//! once the close flush delay has passed after the search ended.

use crate::config::SearchConfig;
use crate::search::{
    write_events, ProgressEvent, SearchOrchestrator, SearchOutcome, SearchRequest, SearchSession,
};
use crate::server::shutdown::{ConnectionGuard, ShutdownCoordinator};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::error::{CapacityError, Error as WsError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of one messages socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    ReadingRequest,
    Streaming,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Whether `next` may follow `self`.
    ///
    /// `Streaming` is only reachable from `ReadingRequest`; every live state
    /// may move to `Closing`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, ReadingRequest)
                | (ReadingRequest, Streaming)
                | (Connecting | ReadingRequest | Streaming, Closing)
                | (Closing, Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::ReadingRequest => write!(f, "reading request"),
            ConnectionState::Streaming => write!(f, "streaming"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// State shared across messages sockets
#[derive(Clone)]
pub struct MessagesSocketState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub settings: SearchConfig,
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// Create the messages socket router
pub fn create_messages_router(state: MessagesSocketState) -> Router {
    Router::new()
        .route("/api/topics/:topicName/messages", get(ws_topic_messages))
        .with_state(state)
}

async fn ws_topic_messages(
    ws: WebSocketUpgrade,
    State(state): State<MessagesSocketState>,
    Path(path_topic): Path<String>,
) -> Response {
    let Some(guard) = state.shutdown.connection_guard() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "Server is shutting down" })),
        )
            .into_response();
    };

    debug!(topic = %path_topic, "Messages socket upgrade requested");
    let limit = state.settings.max_request_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_failed_upgrade(|e| warn!(error = %e, "Messages socket upgrade failed"))
        .on_upgrade(move |socket| handle_messages_socket(socket, state, path_topic, guard))
}

/// What arrived as the first client frame
enum FirstFrame {
    Request(Vec<u8>),
    TooLarge { size: usize, max_size: usize },
    PeerClosed,
    Failed(axum::Error),
    TimedOut,
    Shutdown,
}

/// Tracks and logs state transitions for one connection
struct Lifecycle<'a> {
    connection_id: &'a str,
    state: ConnectionState,
}

impl<'a> Lifecycle<'a> {
    fn new(connection_id: &'a str) -> Self {
        Self {
            connection_id,
            state: ConnectionState::Connecting,
        }
    }

    fn advance(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            warn!(
                connection_id = %self.connection_id,
                from = %self.state,
                to = %next,
                "Unexpected connection state transition"
            );
        }
        debug!(connection_id = %self.connection_id, from = %self.state, to = %next, "Connection state");
        self.state = next;
    }
}

async fn handle_messages_socket(
    socket: WebSocket,
    state: MessagesSocketState,
    path_topic: String,
    _guard: ConnectionGuard,
) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let mut lifecycle = Lifecycle::new(&connection_id);
    let (mut sender, mut receiver) = socket.split();
    let settings = &state.settings;

    lifecycle.advance(ConnectionState::ReadingRequest);
    let first = read_first_frame(&mut receiver, state.shutdown.token(), settings.deadline).await;
    let flush = settings.close_flush;

    let raw = match first {
        FirstFrame::Request(raw) => raw,
        FirstFrame::TooLarge { size, max_size } => {
            warn!(connection_id = %connection_id, size, max_size, "Search request exceeds size limit");
            lifecycle.advance(ConnectionState::Closing);
            close_with(&mut sender, close_code::SIZE, "request too large", flush).await;
            linger(&mut receiver, flush).await;
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
        FirstFrame::Failed(e) => {
            warn!(connection_id = %connection_id, error = %e, "Failed to read search request");
            lifecycle.advance(ConnectionState::Closing);
            close_with(&mut sender, close_code::PROTOCOL, "unreadable request", flush).await;
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
        FirstFrame::TimedOut => {
            info!(
                connection_id = %connection_id,
                timeout_ms = settings.deadline.as_millis() as u64,
                "No search request received in time"
            );
            lifecycle.advance(ConnectionState::Closing);
            close_with(&mut sender, close_code::POLICY, "request timeout", flush).await;
            linger(&mut receiver, flush).await;
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
        FirstFrame::Shutdown => {
            debug!(connection_id = %connection_id, "Server shutting down before request arrived");
            lifecycle.advance(ConnectionState::Closing);
            close_with(&mut sender, close_code::AWAY, "server shutting down", flush).await;
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
        FirstFrame::PeerClosed => {
            debug!(connection_id = %connection_id, "Peer closed before sending a request");
            lifecycle.advance(ConnectionState::Closing);
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
    };

    let request = match SearchRequest::validate(&raw) {
        Ok(request) => request,
        Err(e) if e.is_malformed() => {
            warn!(connection_id = %connection_id, error = %e, "Rejecting undecodable search request");
            lifecycle.advance(ConnectionState::Closing);
            close_with(&mut sender, close_code::INVALID, "malformed request", flush).await;
            linger(&mut receiver, flush).await;
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
        Err(e) => {
            info!(connection_id = %connection_id, error = %e, "Rejecting invalid search request");
            lifecycle.advance(ConnectionState::Closing);
            send_event(&mut sender, &ProgressEvent::error(e.to_string()), flush).await;
            close_with(&mut sender, close_code::NORMAL, "", flush).await;
            linger(&mut receiver, flush).await;
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
    };

    if request.topic_name() != path_topic {
        debug!(
            connection_id = %connection_id,
            path_topic = %path_topic,
            request_topic = %request.topic_name(),
            "Request topic differs from path topic, using request topic"
        );
    }

    lifecycle.advance(ConnectionState::Streaming);
    let (session, events) = SearchSession::new(state.shutdown.token(), settings.event_buffer);
    let session = Arc::new(session);
    info!(
        connection_id = %connection_id,
        session_id = %session.id(),
        topic = %request.topic_name(),
        "Messages socket streaming"
    );

    let mut writer = tokio::spawn(async move {
        let outcome = write_events(events, &mut sender).await;
        (sender, outcome)
    });
    let mut watcher = tokio::spawn(watch_peer(receiver, Arc::clone(&session)));

    let outcome = state.orchestrator.run(&session, &request).await;

    // A peer that stopped reading keeps the writer parked on the transport
    let (mut sender, written) = match tokio::time::timeout(flush, &mut writer).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(connection_id = %connection_id, error = %e, "Messages socket writer task failed");
            watcher.abort();
            return;
        }
        Err(_) => {
            warn!(
                connection_id = %connection_id,
                flush_ms = flush.as_millis() as u64,
                "Peer stopped reading, dropping connection"
            );
            writer.abort();
            watcher.abort();
            lifecycle.advance(ConnectionState::Closing);
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
    };

    lifecycle.advance(ConnectionState::Closing);
    match &outcome {
        SearchOutcome::Completed {
            elapsed_ms,
            cancelled,
            messages,
        } => info!(
            connection_id = %connection_id,
            elapsed_ms,
            cancelled,
            messages,
            frames = written.frames_written,
            "Message search finished"
        ),
        SearchOutcome::Denied => info!(connection_id = %connection_id, "Message search denied"),
        SearchOutcome::Failed { message } => {
            info!(connection_id = %connection_id, error = %message, "Message search failed")
        }
    }

    if !written.write_failed {
        close_with(&mut sender, close_code::NORMAL, "", flush).await;
    }

    // Hold the transport until the peer acknowledges the close or the flush delay passes
    match tokio::time::timeout(flush, &mut watcher).await {
        Ok(_) => debug!(connection_id = %connection_id, "Peer acknowledged close"),
        Err(_) => {
            debug!(connection_id = %connection_id, "Close flush delay elapsed");
            watcher.abort();
        }
    }
    lifecycle.advance(ConnectionState::Closed);
    info!(connection_id = %connection_id, peer_closed = session.peer_closed(), "Messages socket closed");
}

/// Read the request frame, skipping control frames.
///
/// The size limit is enforced by the transport, which reports an oversized
/// frame as a capacity error.
async fn read_first_frame(
    receiver: &mut SplitStream<WebSocket>,
    shutdown: &CancellationToken,
    wait: Duration,
) -> FirstFrame {
    let expired = tokio::time::sleep(wait);
    tokio::pin!(expired);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return FirstFrame::Shutdown,
            _ = &mut expired => return FirstFrame::TimedOut,
            next = receiver.next() => next,
        };

        return match next {
            Some(Ok(Message::Text(text))) => FirstFrame::Request(text.into_bytes()),
            Some(Ok(Message::Binary(data))) => FirstFrame::Request(data),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => FirstFrame::PeerClosed,
            Some(Err(e)) => classify_read_error(e),
        };
    }
}

fn classify_read_error(e: axum::Error) -> FirstFrame {
    let inner = e.into_inner();
    match inner.downcast_ref::<WsError>() {
        Some(WsError::Capacity(CapacityError::MessageTooLong { size, max_size })) => FirstFrame::TooLarge {
            size: *size,
            max_size: *max_size,
        },
        _ => FirstFrame::Failed(axum::Error::new(inner)),
    }
}

/// Wait for the peer to close, cancelling the session if the search is still
/// running at that point
async fn watch_peer(mut receiver: SplitStream<WebSocket>, session: Arc<SearchSession>) {
    while let Some(next) = receiver.next().await {
        match next {
            Ok(Message::Close(frame)) => {
                debug!(session_id = %session.id(), code = ?frame.as_ref().map(|f| f.code), "Peer sent close frame");
                break;
            }
            Ok(Message::Text(_) | Message::Binary(_)) => {
                debug!(session_id = %session.id(), "Ignoring client frame while streaming");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(session_id = %session.id(), error = %e, "Messages socket read failed");
                break;
            }
        }
    }

    if !session.events().is_terminated() {
        session.mark_peer_closed();
    }
}

/// Best-effort wait for the peer's close acknowledgement
async fn linger(receiver: &mut SplitStream<WebSocket>, flush: Duration) {
    let _ = tokio::time::timeout(flush, async {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
}

/// Write one frame, giving up after `flush` if the peer is not reading
async fn send_bounded<F>(send: F, flush: Duration) -> Result<(), String>
where
    F: Future<Output = Result<(), axum::Error>>,
{
    match tokio::time::timeout(flush, send).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("write timed out after {}ms", flush.as_millis())),
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ProgressEvent, flush: Duration) {
    match event.encode() {
        Ok(frame) => {
            if let Err(e) = send_bounded(sender.send(Message::Text(frame.text)), flush).await {
                debug!(kind = event.kind(), error = %e, "Failed to write frame to websocket");
            }
        }
        Err(e) => warn!(kind = event.kind(), error = %e, "Failed to encode progress event"),
    }
}

/// Send a close frame; the peer may already be gone, so failures are only logged
async fn close_with(
    sender: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &'static str,
    flush: Duration,
) {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    if let Err(e) = send_bounded(sender.send(Message::Close(Some(frame))), flush).await {
        debug!(code, error = %e, "Failed to send close frame");
    }
}
