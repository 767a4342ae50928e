// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the chat server, storage and client.
//!
//! Wire-facing structs serialize with camelCase keys to match the REST and
//! WebSocket payloads consumed by browser clients.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Canonical identifier of a user in the external user directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh random message id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current time as an RFC 3339 UTC timestamp with millisecond precision.
///
/// The fixed width keeps lexical and chronological order identical, which the
/// SQLite queries rely on.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// A durable chat message between two users.
///
/// `read` only ever moves from `false` to `true`, and only for the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}

impl ChatMessage {
    /// Create a new unread message stamped with the current time.
    pub fn new(sender_id: UserId, receiver_id: UserId, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            sender_id,
            receiver_id,
            body: body.into(),
            read: false,
            created_at: now_timestamp(),
        }
    }

    /// Returns true if `user` is the sender or the receiver.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender_id == user || &self.receiver_id == user
    }

    /// The participant on the other side of the conversation from `viewer`.
    pub fn peer_of(&self, viewer: &UserId) -> &UserId {
        if &self.sender_id == viewer {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// Display attributes needed to render a participant without another fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl UserSummary {
    /// Summary carrying only the id, used when the directory has no entry.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            name: id.0.clone(),
            username: id.0.clone(),
            id,
            profile_picture: None,
        }
    }
}

/// A chat message with both participants expanded to [`UserSummary`].
///
/// Payload of the live `private message` and `message sent` events and of
/// history responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMessage {
    pub id: MessageId,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}

impl EnrichedMessage {
    pub fn new(message: ChatMessage, sender: UserSummary, receiver: UserSummary) -> Self {
        Self {
            id: message.id,
            sender,
            receiver,
            body: message.body,
            read: message.read,
            created_at: message.created_at,
        }
    }

    /// Flatten back to the stored representation.
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            id: self.id.clone(),
            sender_id: self.sender.id.clone(),
            receiver_id: self.receiver.id.clone(),
            body: self.body.clone(),
            read: self.read,
            created_at: self.created_at.clone(),
        }
    }
}

/// Per-viewer summary of the history with one other participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub user: UserSummary,
    pub last_message: Option<ChatMessage>,
    pub unread_count: u64,
}

/// An accepted edge in the connections graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEdge {
    pub id: String,
    pub user_id: UserId,
    pub connection_id: UserId,
}

impl ConnectionEdge {
    /// The endpoint that is not `viewer`, or `None` if `viewer` is on neither side.
    pub fn other(&self, viewer: &UserId) -> Option<&UserId> {
        if &self.user_id == viewer {
            Some(&self.connection_id)
        } else if &self.connection_id == viewer {
            Some(&self.user_id)
        } else {
            None
        }
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Identity,
    Directory,
    Graph,
    Gateway,
}
