//! Single-page application serving
//!
//! `GET /` answers with `index.html`. Any other path serves the matching file
//! below the frontend directory, and falls back to `index.html` when no such
//! file exists so client-side routes survive a reload.

use crate::error::{ConsoleError, Result};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Commit the binary was built from, when provided at build time
pub const COMMIT_SHA: &str = match option_env!("TOPICSCOPE_COMMIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Frontend build directory plus the prepared `index.html`
#[derive(Debug, Clone)]
pub struct FrontendAssets {
    root: PathBuf,
    index: Bytes,
}

impl FrontendAssets {
    /// Load `index.html` from `root` and substitute the build placeholders.
    ///
    /// A missing index is a configuration error.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(root, env!("CARGO_PKG_VERSION"), COMMIT_SHA)
    }

    pub fn load_with(root: impl AsRef<Path>, version: &str, commit_sha: &str) -> Result<Self> {
        let root = root.as_ref();
        let index_path = root.join("index.html");
        let index = std::fs::read_to_string(&index_path).map_err(|e| {
            ConsoleError::Config(format!("cannot read index.html at {:?}: {}", index_path, e))
        })?;

        let index = index.replacen("__COMMIT_SHA__", commit_sha, 1);
        let index = if version.is_empty() {
            index
        } else {
            index.replacen("__VERSION__", version, 1)
        };

        info!(path = ?root, version, commit_sha, "Loaded frontend assets");
        Ok(Self {
            root: root.to_path_buf(),
            index: Bytes::from(index),
        })
    }

    pub fn index(&self) -> &Bytes {
        &self.index
    }

    /// Map a request path onto a file below the root.
    ///
    /// Returns `None` for anything that could escape the root.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Serve `index.html`
pub async fn index_handler(State(assets): State<Arc<FrontendAssets>>) -> Response {
    Html(assets.index.clone()).into_response()
}

/// Serve a static file, or `index.html` when it does not exist
pub async fn static_file_handler(State(assets): State<Arc<FrontendAssets>>, uri: Uri) -> Response {
    let Some(path) = assets.resolve(uri.path()) else {
        debug!(path = %uri.path(), "Rejected frontend path outside root");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Not found" })),
        )
            .into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(contents) => ([(header::CONTENT_TYPE, content_type(&path))], contents).into_response(),
        Err(_) => {
            debug!(file = %uri.path(), "requested file not found, serving index");
            Html(assets.index.clone()).into_response()
        }
    }
}
