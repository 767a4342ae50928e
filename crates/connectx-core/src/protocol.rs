// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time event protocol shared by the gateway and the client.
//!
//! Every WebSocket text frame is a JSON object naming the event and carrying
//! its payload:
//!
//! ```json
//! {"event": "join", "data": "user-1"}
//! {"event": "private message", "data": {"sender": "a", "receiver": "b", "message": "hi", "token": "..."}}
//! {"event": "message sent", "data": {"id": "...", "sender": {...}, "receiver": {...}, ...}}
//! {"event": "typing", "data": {"sender": "a"}}
//! {"event": "error", "data": "authentication failed: invalid session token"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConnectxError;
use crate::types::{EnrichedMessage, UserId};

/// Event names as they appear on the wire.
pub mod event_names {
    pub const JOIN: &str = "join";
    pub const PRIVATE_MESSAGE: &str = "private message";
    pub const MESSAGE_SENT: &str = "message sent";
    pub const ERROR: &str = "error";
    pub const TYPING: &str = "typing";
    pub const STOP_TYPING: &str = "stop typing";
}

/// Payload of a client `private message` event.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub sender: UserId,
    pub receiver: UserId,
    pub message: String,
    pub token: String,
}

impl std::fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRequest")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("message_len", &self.message.len())
            .field("token", &"[redacted]")
            .finish()
    }
}

/// Payload of a client `typing` / `stop typing` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingRequest {
    pub sender: UserId,
    pub receiver: UserId,
}

/// Payload of a server `typing` / `stop typing` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
    pub sender: UserId,
}

/// Events sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Associate the connection with the room named after the user id.
    #[serde(rename = "join")]
    Join(UserId),
    #[serde(rename = "private message")]
    PrivateMessage(SendRequest),
    #[serde(rename = "typing")]
    Typing(TypingRequest),
    #[serde(rename = "stop typing")]
    StopTyping(TypingRequest),
}

/// Events sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A message addressed to one of the user ids this connection joined.
    #[serde(rename = "private message")]
    PrivateMessage(EnrichedMessage),
    /// Acknowledgement of a send from this connection.
    #[serde(rename = "message sent")]
    MessageSent(EnrichedMessage),
    #[serde(rename = "error")]
    Error(String),
    #[serde(rename = "typing")]
    Typing(TypingNotice),
    #[serde(rename = "stop typing")]
    StopTyping(TypingNotice),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => event_names::JOIN,
            Self::PrivateMessage(_) => event_names::PRIVATE_MESSAGE,
            Self::Typing(_) => event_names::TYPING,
            Self::StopTyping(_) => event_names::STOP_TYPING,
        }
    }

    pub fn to_frame(&self) -> Result<String, ConnectxError> {
        encode(self)
    }

    pub fn from_frame(frame: &str) -> Result<Self, ConnectxError> {
        decode(frame)
    }
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrivateMessage(_) => event_names::PRIVATE_MESSAGE,
            Self::MessageSent(_) => event_names::MESSAGE_SENT,
            Self::Error(_) => event_names::ERROR,
            Self::Typing(_) => event_names::TYPING,
            Self::StopTyping(_) => event_names::STOP_TYPING,
        }
    }

    pub fn to_frame(&self) -> Result<String, ConnectxError> {
        encode(self)
    }

    pub fn from_frame(frame: &str) -> Result<Self, ConnectxError> {
        decode(frame)
    }
}

fn encode<T: Serialize>(event: &T) -> Result<String, ConnectxError> {
    serde_json::to_string(event).map_err(|e| ConnectxError::Transport {
        message: format!("failed to encode event: {e}"),
        source: Some(Box::new(e)),
    })
}

fn decode<T: for<'de> Deserialize<'de>>(frame: &str) -> Result<T, ConnectxError> {
    serde_json::from_str(frame).map_err(|e| ConnectxError::Transport {
        message: format!("malformed event frame: {e}"),
        source: Some(Box::new(e)),
    })
}
