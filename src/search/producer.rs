//! The message producer seam
//!
//! A [`MessageSearcher`] walks partitions and reports what it finds through
//! the [`ProgressSink`] it is handed. It must stop producing once the
//! cancellation token fires. It does not emit the terminal event: the
//! orchestrator owns `done`/`error`.

use crate::error::Result;
use crate::search::request::SearchRequest;
use crate::search::sink::ProgressSink;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Performs the actual message retrieval for a search
#[async_trait]
pub trait MessageSearcher: Send + Sync {
    /// Run one search, emitting phases and messages into `sink`.
    ///
    /// The sink is shared so that per-partition workers can be spawned with
    /// their own handle to it.
    async fn search(
        &self,
        cancel: CancellationToken,
        request: &SearchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<()>;
}
