//! Graceful shutdown coordinator for Topicscope
//!
//! The coordinator owns the root cancellation token. Every message socket
//! derives its session token from it, so starting shutdown ends all active
//! searches with a cancelled `done` event. Open connections are then drained
//! for a bounded time before the process exits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_DRAIN_TIMEOUT_SECS;

/// Coordinator for graceful shutdown operations
#[derive(Debug)]
pub struct ShutdownCoordinator {
    drain_timeout: Duration,
    /// Whether shutdown has been initiated
    shutdown_initiated: AtomicBool,
    /// Parent of every connection's session token
    root: CancellationToken,
    /// Number of open message sockets
    active_connections: AtomicU64,
    connections_drained: Notify,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator with the default drain timeout
    pub fn new() -> Self {
        Self::with_drain_timeout(Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS))
    }

    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        Self {
            drain_timeout,
            shutdown_initiated: AtomicBool::new(false),
            root: CancellationToken::new(),
            active_connections: AtomicU64::new(0),
            connections_drained: Notify::new(),
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Root token; cancelled once shutdown starts
    pub fn token(&self) -> &CancellationToken {
        &self.root
    }

    /// Get the number of open connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Track a new connection until the returned guard drops.
    ///
    /// Returns `None` once shutdown has started. The connection is counted
    /// before the shutdown flag is checked, so a concurrent shutdown either
    /// rejects it here or waits for it in the drain.
    pub fn connection_guard(self: &Arc<Self>) -> Option<ConnectionGuard> {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
        if self.is_shutting_down() {
            self.connection_closed();
            return None;
        }
        Some(ConnectionGuard {
            coordinator: Arc::clone(self),
        })
    }

    fn connection_closed(&self) {
        let prev = self.active_connections.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            if self.is_shutting_down() {
                debug!("Last connection closed during shutdown");
            }
            self.connections_drained.notify_waiters();
        }
    }

    /// Wait for open connections to close, up to `timeout`.
    ///
    /// Returns the number of connections still open when the timeout elapsed
    /// (0 if all drained gracefully).
    pub async fn drain_connections(&self, timeout: Duration) -> u64 {
        let initial_connections = self.active_connections();

        if initial_connections == 0 {
            debug!("No active connections to drain");
            return 0;
        }

        info!(
            active_connections = initial_connections,
            timeout_secs = timeout.as_secs(),
            "Draining active connections"
        );

        let drain_result = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.connections_drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.active_connections() == 0 {
                    break;
                }
                notified.await;
            }
        })
        .await;

        let remaining = self.active_connections();

        if drain_result.is_err() && remaining > 0 {
            warn!(
                remaining_connections = remaining,
                initial_connections = initial_connections,
                drained = initial_connections.saturating_sub(remaining),
                "Connection drain timeout - abandoning remaining connections"
            );
            remaining
        } else {
            info!(
                drained_connections = initial_connections,
                "All connections drained gracefully"
            );
            0
        }
    }

    /// Initiate graceful shutdown
    ///
    /// Cancels the root token, then waits up to the drain timeout for open
    /// connections to close. Returns the number of connections left open.
    /// Calling it again while a shutdown is in progress is a no-op.
    pub async fn initiate_shutdown(&self) -> u64 {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return 0;
        }

        let start = Instant::now();
        info!(
            drain_timeout_secs = self.drain_timeout.as_secs(),
            active_connections = self.active_connections(),
            "Initiating graceful shutdown"
        );

        self.root.cancel();
        let abandoned = self.drain_connections(self.drain_timeout).await;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            abandoned_connections = abandoned,
            "Graceful shutdown complete"
        );
        abandoned
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for tracking an open connection
#[derive(Debug)]
pub struct ConnectionGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.coordinator.connection_closed();
    }
}
