// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-level models. Row types shared with the chat core live in
//! `connectx_core::types` and are re-exported here.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use connectx_core::types::{ChatMessage, ConnectionEdge, UserSummary};

/// Lifecycle of a connection edge. Only accepted edges allow chatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_is_stored_lowercase() {
        assert_eq!(ConnectionStatus::Accepted.to_string(), "accepted");
        assert_eq!(
            ConnectionStatus::from_str("pending").unwrap(),
            ConnectionStatus::Pending
        );
    }
}
