// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the ConnectX private messaging subsystem.
//!
//! Provides the shared data model, the WebSocket event protocol, the error
//! type, and the traits through which the chat core reaches its external
//! collaborators (identity, user directory, connections graph, message store).

pub mod error;
pub mod protocol;
pub mod traits;
pub mod types;

pub use error::ConnectxError;
pub use protocol::{ClientEvent, SendRequest, ServerEvent, TypingNotice, TypingRequest};
pub use traits::{
    ConnectionsGraph, IdentityValidator, MessageStore, PluginAdapter, StorageAdapter,
    UserDirectory,
};
pub use types::{
    AdapterType, ChatMessage, ConnectionEdge, Conversation, EnrichedMessage, HealthStatus,
    MessageId, UserId, UserSummary,
};
