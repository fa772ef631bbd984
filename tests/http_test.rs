//! HTTP router tests
//!
//! Each test builds the full router from a [`Server`] and exercises it via
//! `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::path::Path;
use tower::ServiceExt;

use topicscope::{Server, ServerConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_without_frontend() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.frontend.enabled = false;
    config
}

fn write_frontend(dir: &Path) {
    std::fs::write(
        dir.join("index.html"),
        r#"<html><body data-version="__VERSION__" data-commit="__COMMIT_SHA__"></body></html>"#,
    )
    .unwrap();
    std::fs::create_dir_all(dir.join("static/js")).unwrap();
    std::fs::write(dir.join("static/js/main.js"), "console.log('topicscope')").unwrap();
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_probe() {
    let server = Server::new(config_without_frontend()).unwrap();
    let (status, _, body) = get(server.router(), "/admin/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_startup_probe_reports_topics() {
    let mut config = config_without_frontend();
    config.demo = true;
    let server = Server::new(config).unwrap();

    let (status, _, body) = get(server.router(), "/admin/startup").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ready");
    assert_eq!(json["topics"], 3);
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_api_path_is_json_404() {
    let dir = tempfile::tempdir().unwrap();
    write_frontend(dir.path());
    let mut config = ServerConfig::default();
    config.frontend.path = dir.path().to_path_buf();
    let server = Server::new(config).unwrap();

    let (status, content_type, body) = get(server.router(), "/api/clusters").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert!(body.contains("Not found"));
}

#[tokio::test]
async fn test_messages_route_requires_upgrade() {
    let server = Server::new(config_without_frontend()).unwrap();
    let (status, _, _) = get(server.router(), "/api/topics/orders/messages").await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_frontend_disabled_answers_404() {
    let server = Server::new(config_without_frontend()).unwrap();
    let (status, _, _) = get(server.router(), "/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Frontend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_frontend_index_and_assets() {
    let dir = tempfile::tempdir().unwrap();
    write_frontend(dir.path());
    let mut config = ServerConfig::default();
    config.frontend.path = dir.path().to_path_buf();
    let server = Server::new(config).unwrap();

    let (status, _, body) = get(server.router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&format!("data-version=\"{}\"", env!("CARGO_PKG_VERSION"))));
    assert!(!body.contains("__COMMIT_SHA__"));

    let (status, content_type, body) = get(server.router(), "/static/js/main.js").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/javascript"));
    assert_eq!(body, "console.log('topicscope')");
}

#[tokio::test]
async fn test_frontend_spa_fallback() {
    let dir = tempfile::tempdir().unwrap();
    write_frontend(dir.path());
    let mut config = ServerConfig::default();
    config.frontend.path = dir.path().to_path_buf();
    let server = Server::new(config).unwrap();

    let (status, content_type, body) = get(server.router(), "/topics/orders/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert!(body.contains("<html>"));
}

#[test]
fn test_missing_index_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.frontend.path = dir.path().to_path_buf();
    assert!(Server::new(config).is_err());
}
