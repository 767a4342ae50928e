// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to the accepted-connections graph.

use async_trait::async_trait;

use crate::error::ConnectxError;
use crate::types::{ConnectionEdge, UserId};

#[async_trait]
pub trait ConnectionsGraph: Send + Sync {
    /// Accepted edges touching `user`, in the order the graph stores them.
    ///
    /// An edge may reference a user that no longer exists; callers must
    /// tolerate that.
    async fn accepted_connections(&self, user: &UserId)
        -> Result<Vec<ConnectionEdge>, ConnectxError>;

    /// Returns true if an accepted edge exists between `a` and `b` in either direction.
    async fn are_connected(&self, a: &UserId, b: &UserId) -> Result<bool, ConnectxError>;
}
