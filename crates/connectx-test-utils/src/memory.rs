// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory collaborator backend for deterministic testing.
//!
//! `MemoryBackend` implements all four collaborator traits over plain
//! collections, plus switches for injecting store failures.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use connectx_core::{
    AdapterType, ChatMessage, ConnectionEdge, ConnectionsGraph, ConnectxError, HealthStatus,
    IdentityValidator, MessageId, MessageStore, PluginAdapter, UserDirectory, UserId, UserSummary,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserSummary>,
    tokens: HashMap<String, UserId>,
    edges: Vec<ConnectionEdge>,
    /// Edges handed to one viewer verbatim, even if they do not touch the viewer.
    raw_edges: Vec<(UserId, ConnectionEdge)>,
    messages: Vec<ChatMessage>,
    fail_writes: bool,
    fail_reads_with: HashSet<UserId>,
    next_edge: u64,
}

/// In-memory identity, directory, graph and message store.
pub struct MemoryBackend {
    state: Mutex<State>,
    health: Mutex<HealthStatus>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            health: Mutex::new(HealthStatus::Healthy),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a user with a session token.
    pub fn add_user(&self, id: &str, name: &str, token: &str) {
        let id = UserId::from(id);
        let mut state = self.state();
        state.users.insert(
            id.clone(),
            UserSummary {
                id: id.clone(),
                name: name.to_string(),
                username: name.to_lowercase(),
                profile_picture: None,
            },
        );
        state.tokens.insert(token.to_string(), id);
    }

    /// Add an accepted edge from `a` to `b`. Repeated calls add duplicate edges.
    pub fn connect(&self, a: &str, b: &str) {
        let mut state = self.state();
        state.next_edge += 1;
        let edge = ConnectionEdge {
            id: format!("edge-{}", state.next_edge),
            user_id: a.into(),
            connection_id: b.into(),
        };
        state.edges.push(edge);
    }

    /// Make `viewer`'s edge listing include an `a`-`b` edge as stored.
    pub fn add_raw_edge(&self, viewer: &str, a: &str, b: &str) {
        let mut state = self.state();
        state.next_edge += 1;
        let edge = ConnectionEdge {
            id: format!("edge-{}", state.next_edge),
            user_id: a.into(),
            connection_id: b.into(),
        };
        state.raw_edges.push((viewer.into(), edge));
    }

    /// Insert an unread message with a fixed timestamp.
    pub fn seed_message(&self, sender: &str, receiver: &str, body: &str, created_at: &str) -> MessageId {
        let mut message = ChatMessage::new(sender.into(), receiver.into(), body);
        message.created_at = created_at.to_string();
        let id = message.id.clone();
        self.state().messages.push(message);
        id
    }

    /// Every stored message in insertion order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }

    /// Make `insert_message` and `mark_read` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Make per-pair reads involving `peer` fail.
    pub fn fail_reads_with(&self, peer: &str) {
        self.state().fail_reads_with.insert(peer.into());
    }

    /// Status reported by the next health checks.
    pub fn set_health(&self, status: HealthStatus) {
        *self.health.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn check_read(state: &State, a: &UserId, b: &UserId) -> Result<(), ConnectxError> {
        if state.fail_reads_with.contains(a) || state.fail_reads_with.contains(b) {
            return Err(ConnectxError::storage("injected read failure"));
        }
        Ok(())
    }

    fn pair(message: &ChatMessage, a: &UserId, b: &UserId) -> bool {
        (&message.sender_id == a && &message.receiver_id == b)
            || (&message.sender_id == b && &message.receiver_id == a)
    }

    fn mark_matching(
        &self,
        receiver: &UserId,
        sender: &UserId,
        keep: impl Fn(&ChatMessage) -> bool,
    ) -> Result<u64, ConnectxError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(ConnectxError::storage("injected write failure"));
        }
        let mut changed = 0;
        for message in state.messages.iter_mut().filter(|m| {
            &m.receiver_id == receiver && &m.sender_id == sender && !m.read && keep(m)
        }) {
            message.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConnectxError> {
        Ok(self.health.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn shutdown(&self) -> Result<(), ConnectxError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityValidator for MemoryBackend {
    async fn authenticate(&self, token: &str) -> Result<UserSummary, ConnectxError> {
        let state = self.state();
        state
            .tokens
            .get(token)
            .and_then(|id| state.users.get(id))
            .cloned()
            .ok_or_else(|| ConnectxError::Auth("invalid session token".into()))
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn get_user(&self, id: &UserId) -> Result<Option<UserSummary>, ConnectxError> {
        Ok(self.state().users.get(id).cloned())
    }
}

#[async_trait]
impl ConnectionsGraph for MemoryBackend {
    async fn accepted_connections(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConnectionEdge>, ConnectxError> {
        let state = self.state();
        let mut edges: Vec<ConnectionEdge> = state
            .edges
            .iter()
            .filter(|e| &e.user_id == user || &e.connection_id == user)
            .cloned()
            .collect();
        edges.extend(
            state
                .raw_edges
                .iter()
                .filter(|(viewer, _)| viewer == user)
                .map(|(_, edge)| edge.clone()),
        );
        Ok(edges)
    }

    async fn are_connected(&self, a: &UserId, b: &UserId) -> Result<bool, ConnectxError> {
        Ok(self.state().edges.iter().any(|e| {
            (&e.user_id == a && &e.connection_id == b) || (&e.user_id == b && &e.connection_id == a)
        }))
    }
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), ConnectxError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(ConnectxError::storage("injected write failure"));
        }
        state.messages.push(message.clone());
        Ok(())
    }

    async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, ConnectxError> {
        let state = self.state();
        Self::check_read(&state, a, b)?;
        let mut history: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|m| Self::pair(m, a, b))
            .cloned()
            .collect();
        // Stable: ties keep insertion order.
        history.sort_by(|x, y| x.created_at.cmp(&y.created_at));
        Ok(history)
    }

    async fn last_message(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<ChatMessage>, ConnectxError> {
        let state = self.state();
        Self::check_read(&state, a, b)?;
        // max_by_key returns the last maximum, which is the newest insert on ties.
        Ok(state
            .messages
            .iter()
            .filter(|m| Self::pair(m, a, b))
            .max_by_key(|m| m.created_at.clone())
            .cloned())
    }

    async fn unread_count(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
        let state = self.state();
        Self::check_read(&state, receiver, sender)?;
        Ok(state
            .messages
            .iter()
            .filter(|m| &m.receiver_id == receiver && &m.sender_id == sender && !m.read)
            .count() as u64)
    }

    async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
        self.mark_matching(receiver, sender, |_| true)
    }

    async fn mark_read_until(
        &self,
        receiver: &UserId,
        sender: &UserId,
        until: &str,
    ) -> Result<u64, ConnectxError> {
        self.mark_matching(receiver, sender, |m| m.created_at.as_str() <= until)
    }
}
