//! Shared test fixtures and utilities for Topicscope integration tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Features
//!
//! - `TestServer`: runs a server on an ephemeral port and stops it on drop
//! - `connect` / `search`: WebSocket client helpers for the messages socket
//! - `BlockingSearcher`: a producer that waits for cancellation

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use topicscope::search::{MessageSearcher, ProgressSink, SearchRequest};
use topicscope::server::shutdown::ShutdownCoordinator;
use topicscope::{MemoryTopicStore, Result, Server, ServerConfig, TopicMessage};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for any single wait in these tests
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Configuration
// ============================================================================

/// Server configuration suited to tests: no frontend, short close linger
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.http_addr = "127.0.0.1:8080".parse().unwrap();
    config.frontend.enabled = false;
    config.search.close_flush = Duration::from_millis(200);
    config.drain_timeout = Duration::from_secs(2);
    config
}

/// Store with `orders` (3 partitions) holding `records` records each
pub fn orders_store(records: usize) -> Arc<MemoryTopicStore> {
    let store = MemoryTopicStore::new();
    store.create_topic("orders", 3).unwrap();
    for partition in 0..3 {
        for seq in 0..records {
            let value = format!(r#"{{"order":{},"partition":{}}}"#, seq, partition);
            store
                .produce("orders", partition, Some(format!("o-{}", seq).as_bytes()), value.as_bytes())
                .unwrap();
        }
    }
    Arc::new(store)
}

// ============================================================================
// Test server
// ============================================================================

/// A running server bound to `127.0.0.1:0`
pub struct TestServer {
    pub addr: SocketAddr,
    coordinator: Arc<ShutdownCoordinator>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    pub async fn start(config: ServerConfig, store: Arc<MemoryTopicStore>) -> Self {
        let searcher: Arc<dyn MessageSearcher> = store.clone();
        Self::start_with_searcher(config, store, searcher).await
    }

    pub async fn start_with_searcher(
        config: ServerConfig,
        store: Arc<MemoryTopicStore>,
        searcher: Arc<dyn MessageSearcher>,
    ) -> Self {
        let server = Server::with_searcher(config, store, searcher).unwrap();
        let coordinator = Arc::clone(server.shutdown_coordinator());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = stopped.await;
                })
                .await
        });

        Self {
            addr,
            coordinator,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Message sockets the server is still holding open
    pub fn active_connections(&self) -> u64 {
        self.coordinator.active_connections()
    }

    /// Wait until the server has released every message socket
    pub async fn wait_for_idle(&self, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while self.active_connections() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Trigger graceful shutdown and wait for the server to finish
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => tokio::time::timeout(TEST_TIMEOUT, handle)
                .await
                .expect("server did not shut down")
                .expect("server task panicked"),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// WebSocket client helpers
// ============================================================================

pub async fn connect(server: &TestServer, topic: &str) -> WsClient {
    let url = server.url(&format!("/api/topics/{}/messages", topic));
    let (ws, _response) = tokio::time::timeout(TEST_TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("websocket handshake failed");
    ws
}

pub fn request(topic: &str, start_offset: i64, partition_id: i32, max_results: u16) -> String {
    serde_json::json!({
        "topicName": topic,
        "startOffset": start_offset,
        "partitionId": partition_id,
        "maxResults": max_results,
    })
    .to_string()
}

/// Everything the server sent until it closed the connection
#[derive(Debug, Default)]
pub struct Transcript {
    pub events: Vec<Value>,
    pub close: Option<CloseFrame<'static>>,
}

impl Transcript {
    pub fn types(&self) -> Vec<&str> {
        self.events
            .iter()
            .map(|e| e["type"].as_str().unwrap_or_default())
            .collect()
    }

    pub fn of_type(&self, kind: &str) -> Vec<&Value> {
        self.events.iter().filter(|e| e["type"] == kind).collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e["type"] == "done" || e["type"] == "error")
            .count()
    }

    pub fn close_code(&self) -> Option<u16> {
        self.close.as_ref().map(|f| u16::from(f.code))
    }
}

/// Read frames until the server closes the connection
pub async fn read_until_close(ws: &mut WsClient) -> Transcript {
    let mut transcript = Transcript::default();
    loop {
        let next = tokio::time::timeout(TEST_TIMEOUT, ws.next())
            .await
            .expect("server did not close the connection");
        match next {
            Some(Ok(Message::Text(text))) => {
                transcript.events.push(serde_json::from_str(&text).expect("frame is not JSON"));
            }
            Some(Ok(Message::Close(frame))) => {
                transcript.close = frame;
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(_)) | None => break,
        }
    }
    transcript
}

/// Connect, send `body` as the request frame and collect the response
pub async fn search(server: &TestServer, topic: &str, body: String) -> Transcript {
    let mut ws = connect(server, topic).await;
    ws.send(Message::Text(body)).await.unwrap();
    read_until_close(&mut ws).await
}

// ============================================================================
// Producers
// ============================================================================

/// Producer that emits one phase and then waits for cancellation
#[derive(Debug, Default)]
pub struct BlockingSearcher {
    pub started: AtomicUsize,
    pub observed_cancellation: AtomicUsize,
    pub running: tokio::sync::Notify,
}

#[async_trait]
impl MessageSearcher for BlockingSearcher {
    async fn search(
        &self,
        cancel: CancellationToken,
        _request: &SearchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        sink.emit_phase("Waiting for messages").await?;
        self.running.notify_one();
        cancel.cancelled().await;
        self.observed_cancellation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Producer that streams large messages as fast as the sink accepts them
#[derive(Debug, Default)]
pub struct FloodSearcher {
    pub emitted: AtomicUsize,
}

#[async_trait]
impl MessageSearcher for FloodSearcher {
    async fn search(
        &self,
        cancel: CancellationToken,
        request: &SearchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<()> {
        let value = "x".repeat(256 * 1024);
        let mut offset = 0;
        while !cancel.is_cancelled() {
            let message = TopicMessage::from_raw(request.topic_name(), 0, offset, 0, None, value.as_bytes());
            if sink.emit_message(message).await.is_err() {
                break;
            }
            self.emitted.fetch_add(1, Ordering::SeqCst);
            offset += 1;
        }
        Ok(())
    }
}
