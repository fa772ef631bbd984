//! Search orchestration
//!
//! [`SearchOrchestrator::run`] drives one search on one session:
//!
//! 1. Ask the [`TopicAuthorizer`] whether the topic may be viewed. A denial
//!    produces a single `error` event and no producer is started.
//! 2. Derive the search token: session cancellation plus a fixed deadline.
//! 3. Run the [`MessageSearcher`] with that token and the session's sink.
//! 4. Emit the terminal event. Producer failures become `error`; completion
//!    or cancellation becomes `done` with `isCancelled` set accordingly.
//!
//! The orchestrator is the only component that emits terminal events.

use crate::search::authorizer::TopicAuthorizer;
use crate::search::producer::MessageSearcher;
use crate::search::request::SearchRequest;
use crate::search::session::{search_token, SearchSession};
use crate::search::sink::{ProgressSink, SinkError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default upper bound on the duration of a single search
pub const DEFAULT_SEARCH_DEADLINE: Duration = Duration::from_secs(18);

/// Default bound on queueing the terminal event behind a stalled writer
pub const DEFAULT_TERMINAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Error message sent when the authorizer denies access
pub const PERMISSION_DENIED_MESSAGE: &str =
    "You don't have permissions to view messages in that topic";

/// How a search ended
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Authorization denied, producer never started
    Denied,
    /// `done` was emitted
    Completed {
        elapsed_ms: f64,
        cancelled: bool,
        messages: u64,
    },
    /// `error` was emitted
    Failed { message: String },
}

/// Ties authorization, deadline and producer together for one search
pub struct SearchOrchestrator {
    authorizer: Arc<dyn TopicAuthorizer>,
    searcher: Arc<dyn MessageSearcher>,
    deadline: Duration,
    terminal_timeout: Duration,
}

impl SearchOrchestrator {
    pub fn new(authorizer: Arc<dyn TopicAuthorizer>, searcher: Arc<dyn MessageSearcher>) -> Self {
        Self {
            authorizer,
            searcher,
            deadline: DEFAULT_SEARCH_DEADLINE,
            terminal_timeout: DEFAULT_TERMINAL_TIMEOUT,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// How long the terminal event may wait for room in a full event queue.
    ///
    /// A peer that stops reading backs the queue up; past this bound the
    /// terminal event is given up on so the connection can be released.
    pub fn with_terminal_timeout(mut self, timeout: Duration) -> Self {
        self.terminal_timeout = timeout;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run one search to its terminal event
    pub async fn run(&self, session: &SearchSession, request: &SearchRequest) -> SearchOutcome {
        let sink = session.events();
        let topic = request.topic_name();

        let allowed = tokio::select! {
            biased;
            result = self.authorizer.can_view_topic_messages(topic) => result,
            _ = session.cancellation().cancelled() => {
                debug!(session_id = %session.id(), "Connection cancelled during authorization");
                return self.finish_done(session, 0.0, true).await;
            }
        };

        match allowed {
            Ok(true) => {}
            Ok(false) => {
                info!(session_id = %session.id(), topic = %topic, "Requester has no permissions to view messages in the requested topic");
                self.emit_terminal(session, "error", sink.emit_error(PERMISSION_DENIED_MESSAGE))
                    .await;
                return SearchOutcome::Denied;
            }
            Err(e) => {
                warn!(session_id = %session.id(), topic = %topic, error = %e, "Authorization check failed");
                return self.finish_error(session, e.client_message()).await;
            }
        }

        let start = Instant::now();
        let (token, _guard) = search_token(session.cancellation(), self.deadline);

        debug!(
            session_id = %session.id(),
            topic = %topic,
            start_offset = request.start_offset(),
            partition_id = request.partition_id(),
            max_results = request.max_results(),
            "Starting message search"
        );

        let result = tokio::select! {
            biased;
            result = self.searcher.search(token.clone(), request, session.sink()) => Some(result),
            _ = token.cancelled() => None,
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let cancelled = token.is_cancelled();

        match result {
            Some(Err(e)) if !cancelled => {
                warn!(session_id = %session.id(), topic = %topic, error = %e, "Message search failed");
                self.finish_error(session, e.client_message()).await
            }
            _ => {
                if cancelled {
                    let reason = if session.peer_closed() {
                        "peer closed"
                    } else if session.cancellation().is_cancelled() {
                        "shutdown"
                    } else {
                        "deadline"
                    };
                    debug!(session_id = %session.id(), reason, elapsed_ms, "Message search cancelled");
                }
                self.finish_done(session, elapsed_ms, cancelled).await
            }
        }
    }

    async fn finish_done(&self, session: &SearchSession, elapsed_ms: f64, cancelled: bool) -> SearchOutcome {
        let sink = session.events();
        self.emit_terminal(session, "done", sink.emit_done(elapsed_ms, cancelled))
            .await;
        SearchOutcome::Completed {
            elapsed_ms,
            cancelled,
            messages: sink.messages_emitted(),
        }
    }

    async fn finish_error(&self, session: &SearchSession, message: String) -> SearchOutcome {
        self.emit_terminal(session, "error", session.events().emit_error(&message))
            .await;
        SearchOutcome::Failed { message }
    }

    async fn emit_terminal<F>(&self, session: &SearchSession, kind: &'static str, emit: F)
    where
        F: Future<Output = std::result::Result<(), SinkError>>,
    {
        match tokio::time::timeout(self.terminal_timeout, emit).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(session_id = %session.id(), kind, error = %e, "Failed to emit terminal event"),
            Err(_) => warn!(
                session_id = %session.id(),
                kind,
                timeout_ms = self.terminal_timeout.as_millis() as u64,
                "Event queue stalled, dropping terminal event"
            ),
        }
    }
}
