//! Server implementation for Topicscope
//!
//! The server wires the topic store, the authorizer and the search
//! orchestrator into one HTTP router and owns the shutdown sequence.

pub mod frontend;
pub mod http;
pub mod messages_ws;
pub mod shutdown;

use crate::config::ServerConfig;
use crate::error::{ConsoleError, Result};
use crate::search::{
    AllowAllAuthorizer, MessageSearcher, SearchOrchestrator, TopicAuthorizer, TopicDenyList,
};
use crate::server::frontend::FrontendAssets;
use crate::server::messages_ws::MessagesSocketState;
use crate::server::shutdown::ShutdownCoordinator;
use crate::storage::MemoryTopicStore;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Topicscope server
pub struct Server {
    config: ServerConfig,

    /// Topic store backing the startup probe and, by default, searches
    store: Arc<MemoryTopicStore>,

    orchestrator: Arc<SearchOrchestrator>,

    /// Prepared frontend, when serving it is enabled
    frontend: Option<Arc<FrontendAssets>>,

    shutdown_coordinator: Arc<ShutdownCoordinator>,

    start_time: Instant,
}

impl Server {
    /// Create a server whose searches read from the in-memory store
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = if config.demo {
            info!("Starting in demo mode - seeding demo topics");
            Arc::new(MemoryTopicStore::with_demo_topics()?)
        } else {
            Arc::new(MemoryTopicStore::new())
        };
        let searcher: Arc<dyn MessageSearcher> = store.clone();
        Self::with_searcher(config, store, searcher)
    }

    /// Create a server with a custom producer
    pub fn with_searcher(
        config: ServerConfig,
        store: Arc<MemoryTopicStore>,
        searcher: Arc<dyn MessageSearcher>,
    ) -> Result<Self> {
        config.validate()?;

        let authorizer: Arc<dyn TopicAuthorizer> = if config.denied_topics.is_empty() {
            Arc::new(AllowAllAuthorizer)
        } else {
            info!(denied_topics = ?config.denied_topics, "Restricting message access");
            Arc::new(TopicDenyList::new(config.denied_topics.iter()))
        };

        let orchestrator = Arc::new(
            SearchOrchestrator::new(authorizer, searcher)
                .with_deadline(config.search.deadline)
                .with_terminal_timeout(config.search.close_flush),
        );

        let frontend = if config.frontend.enabled {
            Some(Arc::new(FrontendAssets::load(&config.frontend.path)?))
        } else {
            info!("Frontend serving disabled");
            None
        };

        Ok(Self {
            shutdown_coordinator: Arc::new(ShutdownCoordinator::with_drain_timeout(config.drain_timeout)),
            config,
            store,
            orchestrator,
            frontend,
            start_time: Instant::now(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryTopicStore> {
        &self.store
    }

    pub fn shutdown_coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown_coordinator
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let http_state = http::HttpServerState {
            store: self.store.clone(),
            shutdown: self.shutdown_coordinator.clone(),
            start_time: self.start_time,
        };
        let messages_state = MessagesSocketState {
            orchestrator: self.orchestrator.clone(),
            settings: self.config.search.clone(),
            shutdown: self.shutdown_coordinator.clone(),
        };
        http::build_http_router(http_state, messages_state, self.frontend.clone())
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        info!(
            http_addr = %self.config.http_addr,
            demo = self.config.demo,
            frontend = self.frontend.is_some(),
            search_deadline_ms = self.config.search.deadline.as_millis() as u64,
            "Starting Topicscope server"
        );

        let listener = http::bind_http_listener(self.config.http_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `signal` resolves, then shut down gracefully
    pub async fn serve<F>(&self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let token = self.shutdown_coordinator.token().clone();
        let mut http_server = tokio::spawn(http::start_http_server(
            listener,
            self.router(),
            async move { token.cancelled().await },
        ));

        tokio::select! {
            _ = signal => info!("Shutdown signal received"),
            result = &mut http_server => {
                return match result {
                    Ok(result) => result,
                    Err(e) => Err(ConsoleError::Server(format!("HTTP server task failed: {}", e))),
                };
            }
        }

        let abandoned = self.shutdown_coordinator.initiate_shutdown().await;
        if abandoned > 0 {
            warn!(abandoned_connections = abandoned, "Proceeding with forced shutdown");
        }

        match tokio::time::timeout(self.config.drain_timeout, &mut http_server).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ConsoleError::Server(format!("HTTP server task failed: {}", e))),
            Err(_) => {
                warn!("HTTP server did not stop in time, aborting");
                http_server.abort();
                Ok(())
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
