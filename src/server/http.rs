//! HTTP server for the console backend
//!
//! Routes:
//! - Health and startup probes (`/admin/health`, `/admin/startup`)
//! - Streaming message search (`/api/topics/:topicName/messages`, see [`super::messages_ws`])
//! - The frontend single-page application (`/`, anything else not under `/api`)

use crate::error::{ConsoleError, Result};
use crate::server::frontend::{index_handler, static_file_handler, FrontendAssets};
use crate::server::messages_ws::{create_messages_router, MessagesSocketState};
use crate::server::shutdown::ShutdownCoordinator;
use crate::storage::MemoryTopicStore;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

/// State for the probe handlers
#[derive(Clone)]
pub struct HttpServerState {
    pub store: Arc<MemoryTopicStore>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub start_time: Instant,
}

fn build_base_router(state: HttpServerState) -> Router {
    Router::new()
        .route("/admin/health", get(health_handler))
        .route("/admin/startup", get(startup_handler))
        .with_state(state)
}

fn build_frontend_router(frontend: Option<Arc<FrontendAssets>>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .fallback(fallback_handler)
        .with_state(frontend)
}

/// Assemble the full router
pub fn build_http_router(
    state: HttpServerState,
    messages: MessagesSocketState,
    frontend: Option<Arc<FrontendAssets>>,
) -> Router {
    build_base_router(state)
        .merge(create_messages_router(messages))
        .merge(build_frontend_router(frontend))
}

/// Bind the HTTP listener
pub async fn bind_http_listener(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            let port = addr.port();
            ConsoleError::Server(format!(
                "HTTP port {} is already in use. \
                 Fix: Use --http-addr 0.0.0.0:{} to pick a different port, \
                 or stop the existing process.",
                port,
                port.saturating_add(100)
            ))
        } else {
            ConsoleError::Server(format!("Failed to bind HTTP server to {}: {}", addr, e))
        }
    })
}

/// Serve `app` on `listener` until `signal` resolves
pub async fn start_http_server<F>(listener: TcpListener, app: Router, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Starting HTTP server (probes, messages socket, frontend)");

    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| ConsoleError::Server(format!("HTTP server error: {}", e)))
}

/// Liveness probe handler (always returns OK if server is running)
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Startup probe handler
async fn startup_handler(State(state): State<HttpServerState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "shutting_down" })),
        )
            .into_response();
    }

    let body = json!({
        "status": "ready",
        "topics": state.store.topic_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

fn not_found(uri: &Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "path": uri.path() })),
    )
        .into_response()
}

async fn root_handler(State(frontend): State<Option<Arc<FrontendAssets>>>, uri: Uri) -> Response {
    match frontend {
        Some(assets) => index_handler(State(assets)).await,
        None => not_found(&uri),
    }
}

async fn fallback_handler(State(frontend): State<Option<Arc<FrontendAssets>>>, uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return not_found(&uri);
    }
    match frontend {
        Some(assets) => static_file_handler(State(assets), uri).await,
        None => not_found(&uri),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_state() -> HttpServerState {
        let store = Arc::new(MemoryTopicStore::new());
        store.create_topic("orders", 3).unwrap();
        HttpServerState {
            store,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_startup_handler_ready() {
        let response = startup_handler(State(create_test_state())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_startup_handler_shutting_down() {
        let state = create_test_state();
        state.shutdown.initiate_shutdown().await;
        let response = startup_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_fallback_without_frontend() {
        let response = fallback_handler(State(None), Uri::from_static("/topics")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = root_handler(State(None), Uri::from_static("/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let listener = bind_http_listener("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let err = bind_http_listener(addr).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }
}
