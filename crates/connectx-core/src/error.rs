// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the ConnectX chat subsystem.

use thiserror::Error;

/// The primary error type shared by the server, storage and client crates.
#[derive(Debug, Error)]
pub enum ConnectxError {
    /// Configuration errors (invalid TOML, missing fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The session token is unknown, stale, or belongs to another user.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The caller is authenticated but not allowed to access the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The message was rejected before persistence (empty or oversized body).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport failures (connect refused, socket closed, bad frame).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered a send with an `error` event.
    #[error("message rejected by server: {0}")]
    Rejected(String),

    /// A send was attempted while the client session is not connected.
    #[error("not connected to the chat server")]
    Offline,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConnectxError {
    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Build a transport failure without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Text sent to a client in an `error` event.
    ///
    /// Storage internals are not leaked to peers.
    pub fn client_message(&self) -> String {
        match self {
            Self::Storage { .. } => "failed to save message".to_string(),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_hides_details_from_clients() {
        let err = ConnectxError::storage(std::io::Error::other("disk full at /var/db"));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.client_message(), "failed to save message");
    }

    #[test]
    fn auth_error_message_is_forwarded() {
        let err = ConnectxError::Auth("invalid session token".into());
        assert_eq!(
            err.client_message(),
            "authentication failed: invalid session token"
        );
    }

    #[test]
    fn transport_helper_has_no_source() {
        match ConnectxError::transport("socket closed") {
            ConnectxError::Transport { message, source } => {
                assert_eq!(message, "socket closed");
                assert!(source.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
