// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-token validation against the user directory.

use async_trait::async_trait;

use crate::error::ConnectxError;
use crate::types::{UserId, UserSummary};

/// Confirms that an opaque session token is live and who owns it.
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// Resolves a session token to its owner.
    ///
    /// Unknown or expired tokens yield [`ConnectxError::Auth`].
    async fn authenticate(&self, token: &str) -> Result<UserSummary, ConnectxError>;

    /// Confirms that `token` currently belongs to `claimed` and returns the
    /// canonical user id.
    async fn validate(&self, token: &str, claimed: &UserId) -> Result<UserId, ConnectxError> {
        let owner = self.authenticate(token).await?;
        if &owner.id == claimed {
            Ok(owner.id)
        } else {
            Err(ConnectxError::Auth(format!(
                "session token does not belong to {claimed}"
            )))
        }
    }
}
