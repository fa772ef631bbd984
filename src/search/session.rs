//! Per-connection search session state
//!
//! A [`SearchSession`] lives exactly as long as one messages socket. It owns
//! the connection's cancellation token and the progress sink feeding the
//! connection writer. The orchestrator only ever borrows it.

use crate::search::sink::{EventSink, ProgressSink};
use crate::search::event::ProgressEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// State shared by the connection manager and the orchestrator
#[derive(Debug)]
pub struct SearchSession {
    id: String,
    cancel: CancellationToken,
    sink: Arc<EventSink>,
    peer_closed: AtomicBool,
}

impl SearchSession {
    /// Create a session whose lifetime is bounded by `parent` (server
    /// shutdown), returning the event queue for the connection writer
    pub fn new(parent: &CancellationToken, event_buffer: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sink, rx) = EventSink::channel(event_buffer);
        let session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            cancel: parent.child_token(),
            sink: Arc::new(sink),
            peer_closed: AtomicBool::new(false),
        };
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token cancelled when the connection ends for any reason
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn events(&self) -> &Arc<EventSink> {
        &self.sink
    }

    /// The sink as the capability handed to producers
    pub fn sink(&self) -> Arc<dyn ProgressSink> {
        self.sink.clone()
    }

    /// Record that the remote peer closed the connection and cancel any
    /// running search
    pub fn mark_peer_closed(&self) {
        if !self.peer_closed.swap(true, Ordering::AcqRel) {
            debug!(session_id = %self.id, "Peer closed connection, cancelling search");
        }
        self.cancel.cancel();
    }

    pub fn peer_closed(&self) -> bool {
        self.peer_closed.load(Ordering::Acquire)
    }
}

/// Derive the token governing one search.
///
/// The returned token is cancelled when the parent is cancelled (peer close
/// or server shutdown) or when `deadline` elapses, whichever comes first.
/// Dropping the guard cancels it too, which also stops the deadline timer.
pub fn search_token(parent: &CancellationToken, deadline: Duration) -> (CancellationToken, DropGuard) {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                debug!(deadline_ms = deadline.as_millis() as u64, "Search deadline elapsed");
                timer.cancel();
            }
            _ = timer.cancelled() => {}
        }
    });
    (token.clone(), token.drop_guard())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peer_close_cancels_session() {
        let root = CancellationToken::new();
        let (session, _rx) = SearchSession::new(&root, 8);
        assert!(!session.cancellation().is_cancelled());

        session.mark_peer_closed();
        assert!(session.peer_closed());
        assert!(session.cancellation().is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_session() {
        let root = CancellationToken::new();
        let (session, _rx) = SearchSession::new(&root, 8);
        root.cancel();
        assert!(session.cancellation().is_cancelled());
        assert!(!session.peer_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_token_deadline() {
        let root = CancellationToken::new();
        let (token, _guard) = search_token(&root, Duration::from_secs(18));

        tokio::time::sleep(Duration::from_secs(17)).await;
        assert!(!token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(token.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn test_search_token_follows_parent_and_guard() {
        let parent = CancellationToken::new();
        let (token, guard) = search_token(&parent, Duration::from_secs(60));
        parent.cancel();
        assert!(token.is_cancelled());
        drop(guard);

        let parent = CancellationToken::new();
        let (token, guard) = search_token(&parent, Duration::from_secs(60));
        drop(guard);
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_session_ids_unique() {
        let root = CancellationToken::new();
        let (a, _ra) = SearchSession::new(&root, 1);
        let (b, _rb) = SearchSession::new(&root, 1);
        assert_ne!(a.id(), b.id());
    }
}
