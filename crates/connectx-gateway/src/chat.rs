// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-side handling of inbound chat events.
//!
//! A `private message` goes through validate, persist, enrich, route and
//! acknowledge, in that order. Only accepted connections may message each
//! other. Any failure before routing is reported to the
//! originating connection only and leaves no trace in storage or in other
//! users' rooms.

use std::sync::Arc;

use connectx_core::{
    ChatMessage, ClientEvent, ConnectionsGraph, ConnectxError, EnrichedMessage, IdentityValidator,
    MessageStore, SendRequest, ServerEvent, TypingNotice, TypingRequest, UserDirectory,
};
use tracing::{debug, info, warn};

use crate::enrich;
use crate::presence::{ConnId, PresenceRouter};

/// The message pipeline and typing relay.
pub struct ChatService {
    identity: Arc<dyn IdentityValidator>,
    directory: Arc<dyn UserDirectory>,
    graph: Arc<dyn ConnectionsGraph>,
    store: Arc<dyn MessageStore>,
    presence: Arc<PresenceRouter>,
    max_message_length: usize,
}

impl ChatService {
    pub fn new(
        identity: Arc<dyn IdentityValidator>,
        directory: Arc<dyn UserDirectory>,
        graph: Arc<dyn ConnectionsGraph>,
        store: Arc<dyn MessageStore>,
        presence: Arc<PresenceRouter>,
        max_message_length: usize,
    ) -> Self {
        Self {
            identity,
            directory,
            graph,
            store,
            presence,
            max_message_length,
        }
    }

    pub fn presence(&self) -> &Arc<PresenceRouter> {
        &self.presence
    }

    /// Dispatch one decoded event from connection `conn`.
    ///
    /// Callers must await this before handling the next event of the same
    /// connection so acks and errors come out in send order.
    pub async fn handle_event(&self, conn: &ConnId, event: ClientEvent) {
        match event {
            ClientEvent::Join(user) => {
                self.presence.join(conn, &user);
            }
            ClientEvent::PrivateMessage(request) => {
                // Outcome is already reported to the client.
                let _ = self.handle_send(conn, request).await;
            }
            ClientEvent::Typing(request) => self.relay_typing(conn, request, true),
            ClientEvent::StopTyping(request) => self.relay_typing(conn, request, false),
        }
    }

    /// Run the full pipeline for a send from `conn`, emitting either
    /// `message sent` or `error` back to it.
    pub async fn handle_send(
        &self,
        conn: &ConnId,
        request: SendRequest,
    ) -> Result<EnrichedMessage, ConnectxError> {
        match self.deliver(request).await {
            Ok(enriched) => {
                self.presence
                    .reply(conn, ServerEvent::MessageSent(enriched.clone()))
                    .await;
                Ok(enriched)
            }
            Err(e) => {
                warn!(conn = %conn, error = %e, "send rejected");
                self.presence
                    .reply(conn, ServerEvent::Error(e.client_message()))
                    .await;
                Err(e)
            }
        }
    }

    /// Validate, persist, enrich and route a message. Does not acknowledge.
    pub async fn deliver(&self, request: SendRequest) -> Result<EnrichedMessage, ConnectxError> {
        debug!(?request, "inbound private message");
        let sender = self
            .identity
            .validate(&request.token, &request.sender)
            .await?;
        self.check_body(&request.message)?;
        if !self.graph.are_connected(&sender, &request.receiver).await? {
            return Err(ConnectxError::Forbidden(format!(
                "{} is not one of your connections",
                request.receiver
            )));
        }

        let message = ChatMessage::new(sender, request.receiver, request.message);
        self.store.insert_message(&message).await?;

        let enriched = enrich::enrich(self.directory.as_ref(), message).await;
        let delivered = self.presence.route(
            &enriched.receiver.id,
            &ServerEvent::PrivateMessage(enriched.clone()),
        );
        info!(
            id = %enriched.id,
            sender = %enriched.sender.id,
            receiver = %enriched.receiver.id,
            delivered,
            "message stored"
        );
        Ok(enriched)
    }

    fn check_body(&self, body: &str) -> Result<(), ConnectxError> {
        if body.trim().is_empty() {
            return Err(ConnectxError::InvalidMessage("message is empty".into()));
        }
        let len = body.chars().count();
        if len > self.max_message_length {
            return Err(ConnectxError::InvalidMessage(format!(
                "message is {len} characters, limit is {}",
                self.max_message_length
            )));
        }
        Ok(())
    }

    /// Forward a typing notice to the receiver's room. Unpersisted, unacked.
    ///
    /// Notices whose sender is not a room `conn` joined are dropped.
    pub fn relay_typing(&self, conn: &ConnId, request: TypingRequest, started: bool) {
        if !self.presence.has_joined(conn, &request.sender) {
            debug!(conn = %conn, sender = %request.sender, "dropping typing notice for foreign sender");
            return;
        }
        let notice = TypingNotice {
            sender: request.sender,
        };
        let event = if started {
            ServerEvent::Typing(notice)
        } else {
            ServerEvent::StopTyping(notice)
        };
        self.presence.route(&request.receiver, &event);
    }
}
