// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence rooms: which live connections belong to which user.
//!
//! A room is named after a user id and holds every connection that joined
//! it, so a user with two open tabs receives each routed event twice (once
//! per tab) and a repeated join on one connection changes nothing. Rooms are
//! created on first join and removed when their last connection leaves.
//!
//! Lock order is always `connections` before `rooms`, and no map guard is
//! held while another entry of the same map is looked up.

use std::collections::HashSet;

use connectx_core::{ServerEvent, UserId};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Identifier of one live WebSocket connection.
pub type ConnId = String;

struct ConnectionEntry {
    outbox: mpsc::Sender<ServerEvent>,
    rooms: HashSet<UserId>,
}

/// Routes server events to the live connections of a user.
#[derive(Default)]
pub struct PresenceRouter {
    connections: DashMap<ConnId, ConnectionEntry>,
    rooms: DashMap<UserId, HashSet<ConnId>>,
}

impl PresenceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection's outbound queue. The connection is in no room yet.
    pub fn register(&self, conn: ConnId, outbox: mpsc::Sender<ServerEvent>) {
        self.connections.insert(
            conn,
            ConnectionEntry {
                outbox,
                rooms: HashSet::new(),
            },
        );
    }

    /// Add `conn` to the room of `user`.
    ///
    /// Returns false if the connection was already a member or is not
    /// registered.
    pub fn join(&self, conn: &ConnId, user: &UserId) -> bool {
        let Some(mut entry) = self.connections.get_mut(conn) else {
            warn!(conn = %conn, user = %user, "join from unregistered connection");
            return false;
        };
        if !entry.rooms.insert(user.clone()) {
            return false;
        }
        self.rooms
            .entry(user.clone())
            .or_default()
            .insert(conn.clone());
        debug!(conn = %conn, user = %user, "joined room");
        true
    }

    /// Deliver `event` to every connection in the room of `user`.
    ///
    /// An empty room is a silent no-op. A full or closed outbox drops the
    /// event for that connection only. Returns the number of connections the
    /// event was queued for.
    pub fn route(&self, user: &UserId, event: &ServerEvent) -> usize {
        let members: Vec<ConnId> = match self.rooms.get(user) {
            Some(room) => room.iter().cloned().collect(),
            None => return 0,
        };

        members
            .iter()
            .filter(|conn| self.emit(conn, event.clone()))
            .count()
    }

    /// Deliver `event` to one connection. Returns false if it was dropped.
    pub fn emit(&self, conn: &ConnId, event: ServerEvent) -> bool {
        let Some(outbox) = self.connections.get(conn).map(|e| e.outbox.clone()) else {
            return false;
        };
        match outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(conn = %conn, event = event.name(), "outbox full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!(conn = %conn, event = event.name(), "outbox closed, dropping event");
                false
            }
        }
    }

    /// Deliver a reply to `conn` (an ack or an error for one of its sends),
    /// waiting for outbox space instead of dropping it.
    ///
    /// Returns false only if the connection is gone.
    pub async fn reply(&self, conn: &ConnId, event: ServerEvent) -> bool {
        let Some(outbox) = self.connections.get(conn).map(|e| e.outbox.clone()) else {
            return false;
        };
        match outbox.send(event).await {
            Ok(()) => true,
            Err(e) => {
                debug!(conn = %conn, event = e.0.name(), "outbox closed, dropping reply");
                false
            }
        }
    }

    /// Whether `conn` has joined the room of `user`.
    pub fn has_joined(&self, conn: &ConnId, user: &UserId) -> bool {
        self.connections
            .get(conn)
            .is_some_and(|entry| entry.rooms.contains(user))
    }

    /// Remove `conn` from every room it joined and forget its outbox.
    pub fn leave(&self, conn: &ConnId) {
        let Some((_, entry)) = self.connections.remove(conn) else {
            return;
        };
        for user in entry.rooms {
            if let Some(mut room) = self.rooms.get_mut(&user) {
                room.remove(conn);
            }
            self.rooms.remove_if(&user, |_, members| members.is_empty());
        }
        debug!(conn = %conn, "connection left");
    }

    /// Number of users with at least one live connection.
    pub fn online_users(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of connections in the room of `user`.
    pub fn room_size(&self, user: &UserId) -> usize {
        self.rooms.get(user).map(|room| room.len()).unwrap_or(0)
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.room_size(user) > 0
    }
}
