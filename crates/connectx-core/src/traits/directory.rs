// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to user display attributes.

use async_trait::async_trait;

use crate::error::ConnectxError;
use crate::types::{UserId, UserSummary};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user's display attributes. `Ok(None)` if the user does not exist.
    async fn get_user(&self, id: &UserId) -> Result<Option<UserSummary>, ConnectxError>;
}
