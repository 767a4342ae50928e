// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is a
//! startup error rather than a silently ignored setting.

use serde::{Deserialize, Serialize};

/// Top-level ConnectX configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectxConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message pipeline limits.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Client session manager settings.
    #[serde(default)]
    pub client: ClientConfig,
}

/// HTTP/WebSocket listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("connectx").join("connectx.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("connectx.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Server-side message pipeline limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Longest accepted message body, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Capacity of each connection's outbound event queue.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

fn default_max_message_length() -> usize {
    4000
}

fn default_outbox_capacity() -> usize {
    64
}

/// Client session manager configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// WebSocket endpoint of the chat server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Base URL of the REST read API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Consecutive failed connection attempts before the session goes offline.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt, doubled on each failure.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound for the reconnect delay.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Random jitter applied to each delay, as a fraction in `[0, 1]`.
    #[serde(default = "default_reconnect_jitter")]
    pub reconnect_jitter: f64,

    /// Timeout for a single connection attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long a send waits for its `message sent` acknowledgement.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Quiet period after which a typing indicator clears.
    #[serde(default = "default_typing_quiet_ms")]
    pub typing_quiet_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_url: default_api_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            reconnect_jitter: default_reconnect_jitter(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            typing_quiet_ms: default_typing_quiet_ms(),
        }
    }
}

fn default_server_url() -> String {
    "ws://127.0.0.1:9090/ws".to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:9090".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_max_reconnect_delay_ms() -> u64 {
    10_000
}

fn default_reconnect_jitter() -> f64 {
    0.5
}

fn default_connect_timeout_ms() -> u64 {
    20_000
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_typing_quiet_ms() -> u64 {
    2000
}
