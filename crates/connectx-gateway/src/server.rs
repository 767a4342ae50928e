// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly, shared state and the serve loop.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use connectx_config::model::ChatConfig;
use connectx_core::{
    ConnectionsGraph, ConnectxError, IdentityValidator, MessageStore, PluginAdapter,
    UserDirectory,
};

use crate::aggregator::ConversationAggregator;
use crate::chat::ChatService;
use crate::handlers;
use crate::presence::PresenceRouter;
use crate::ws;

/// The external collaborators the gateway depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityValidator>,
    pub directory: Arc<dyn UserDirectory>,
    pub graph: Arc<dyn ConnectionsGraph>,
    pub store: Arc<dyn MessageStore>,
}

impl Collaborators {
    /// Use one backend for all four roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: IdentityValidator + UserDirectory + ConnectionsGraph + MessageStore + 'static,
    {
        Self {
            identity: backend.clone(),
            directory: backend.clone(),
            graph: backend.clone(),
            store: backend,
        }
    }
}

/// Inputs of GET /health.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    /// Adapter whose health check decides the reported status.
    pub probe: Option<Arc<dyn PluginAdapter>>,
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub chat: Arc<ChatService>,
    pub aggregator: Arc<ConversationAggregator>,
    pub identity: Arc<dyn IdentityValidator>,
    pub presence: Arc<PresenceRouter>,
    pub outbox_capacity: usize,
    pub health: HealthState,
    /// Cancelled to stop the listener and close every live socket.
    pub shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(collaborators: Collaborators, chat: &ChatConfig) -> Self {
        let presence = Arc::new(PresenceRouter::new());
        let service = ChatService::new(
            collaborators.identity.clone(),
            collaborators.directory.clone(),
            collaborators.graph.clone(),
            collaborators.store.clone(),
            presence.clone(),
            chat.max_message_length,
        );
        let aggregator = ConversationAggregator::new(
            collaborators.directory,
            collaborators.graph,
            collaborators.store,
        );
        Self {
            chat: Arc::new(service),
            aggregator: Arc::new(aggregator),
            identity: collaborators.identity,
            presence,
            outbox_capacity: chat.outbox_capacity,
            health: HealthState {
                start_time: Instant::now(),
                probe: None,
            },
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_health_probe(mut self, probe: Arc<dyn PluginAdapter>) -> Self {
        self.health.probe = Some(probe);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// All gateway routes:
/// - GET /ws (event protocol)
/// - GET /chat/history, GET /chat/conversations, POST /chat/mark-read
/// - GET /chat/status, GET /health
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/chat/history", get(handlers::get_history))
        .route("/chat/conversations", get(handlers::get_conversations))
        .route("/chat/mark-read", post(handlers::post_mark_read))
        .route("/chat/status", get(handlers::get_status))
        .route("/health", get(handlers::get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener for `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ConnectxError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ConnectxError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serve until `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<(), ConnectxError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "chat gateway listening");
    }
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ConnectxError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!("chat gateway stopped");
    Ok(())
}
