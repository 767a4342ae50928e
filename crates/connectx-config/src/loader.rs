// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/connectx/connectx.toml`
//! 3. `~/.config/connectx/connectx.toml`
//! 4. `./connectx.toml`
//! 5. `CONNECTX_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ConnectxConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG: &str = "/etc/connectx/connectx.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG: &str = "connectx.toml";

/// Sections recognised by the env provider, in match order.
const SECTIONS: &[&str] = &["server", "storage", "chat", "client"];

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("connectx").join(LOCAL_CONFIG))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ConnectxConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ConnectxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConnectxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConnectxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConnectxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the standard hierarchy, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ConnectxConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider mapping `CONNECTX_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `CONNECTX_CLIENT_MAX_RECONNECT_ATTEMPTS` must become
/// `client.max_reconnect_attempts`. Variables outside the known sections
/// (such as the chat client's `CONNECTX_TOKEN`) are not configuration.
fn env_provider() -> Env {
    Env::prefixed("CONNECTX_")
        .filter(|key| is_section_key(key.as_str()))
        .map(|key| map_env_key(key.as_str()).into())
}

fn is_section_key(key: &str) -> bool {
    map_env_key(key).contains('.')
}

fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("server_port"), "server.port");
        assert_eq!(
            map_env_key("client_max_reconnect_attempts"),
            "client.max_reconnect_attempts"
        );
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("CHAT_OUTBOX_CAPACITY"), "chat.outbox_capacity");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("telemetry_endpoint"), "telemetry_endpoint");
    }

    #[test]
    fn non_section_variables_are_ignored() {
        assert!(is_section_key("client_api_url"));
        assert!(!is_section_key("token"));

        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "")?;
            jail.set_env("CONNECTX_TOKEN", "tok-alice-0001");
            let config = load_config_from_path(Path::new("custom.toml"))
                .expect("unrelated env vars must not break loading");
            assert_eq!(config, ConnectxConfig::default());
            Ok(())
        });
    }

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[server]\nport = 7000\n")?;
            jail.set_env("CONNECTX_SERVER_PORT", "7100");
            jail.set_env("CONNECTX_CLIENT_MAX_RECONNECT_ATTEMPTS", "3");
            let config = load_config_from_path(Path::new("custom.toml"))
                .expect("config should load");
            assert_eq!(config.server.port, 7100);
            assert_eq!(config.client.max_reconnect_attempts, 3);
            Ok(())
        });
    }
}
