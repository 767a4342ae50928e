// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable, append-only chat message log.

use async_trait::async_trait;

use crate::error::ConnectxError;
use crate::types::{ChatMessage, UserId};

/// The single source of truth for chat history.
///
/// Messages are only ever appended; the only mutation is the false -> true
/// transition of the read flag.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message.
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), ConnectxError>;

    /// All messages exchanged between `a` and `b`, oldest first.
    async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, ConnectxError>;

    /// The newest message exchanged between `a` and `b`.
    async fn last_message(&self, a: &UserId, b: &UserId)
        -> Result<Option<ChatMessage>, ConnectxError>;

    /// Number of unread messages sent by `sender` to `receiver`.
    async fn unread_count(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError>;

    /// Flags every unread message from `sender` to `receiver` as read.
    ///
    /// Returns how many messages changed.
    async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError>;

    /// Like [`mark_read`](Self::mark_read), limited to messages created at or
    /// before `until` (an RFC 3339 timestamp as stored).
    async fn mark_read_until(
        &self,
        receiver: &UserId,
        sender: &UserId,
        until: &str,
    ) -> Result<u64, ConnectxError>;
}
