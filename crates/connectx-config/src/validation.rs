// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::ConnectxConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ConnectxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        fail(format!(
            "server.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.server.log_level
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.chat.max_message_length == 0 {
        fail("chat.max_message_length must be at least 1".to_string());
    }

    if config.chat.outbox_capacity == 0 {
        fail("chat.outbox_capacity must be at least 1".to_string());
    }

    let client = &config.client;
    if !(client.server_url.starts_with("ws://") || client.server_url.starts_with("wss://")) {
        fail(format!(
            "client.server_url must start with ws:// or wss://, got `{}`",
            client.server_url
        ));
    }

    if !(client.api_url.starts_with("http://") || client.api_url.starts_with("https://")) {
        fail(format!(
            "client.api_url must start with http:// or https://, got `{}`",
            client.api_url
        ));
    }

    if client.max_reconnect_attempts == 0 || client.max_reconnect_attempts > 100 {
        fail(format!(
            "client.max_reconnect_attempts must be between 1 and 100, got {}",
            client.max_reconnect_attempts
        ));
    }

    if client.reconnect_delay_ms > client.max_reconnect_delay_ms {
        fail(format!(
            "client.reconnect_delay_ms ({}) must not exceed client.max_reconnect_delay_ms ({})",
            client.reconnect_delay_ms, client.max_reconnect_delay_ms
        ));
    }

    if !(0.0..=1.0).contains(&client.reconnect_jitter) {
        fail(format!(
            "client.reconnect_jitter must be within [0, 1], got {}",
            client.reconnect_jitter
        ));
    }

    for (key, value) in [
        ("client.connect_timeout_ms", client.connect_timeout_ms),
        ("client.ack_timeout_ms", client.ack_timeout_ms),
        ("client.typing_quiet_ms", client.typing_quiet_ms),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
