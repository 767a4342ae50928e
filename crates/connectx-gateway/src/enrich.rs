// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attach display attributes to stored messages.

use connectx_core::{ChatMessage, EnrichedMessage, UserDirectory, UserId, UserSummary};
use tracing::warn;

/// Directory entry for `id`, or an id-only placeholder if the lookup misses
/// or fails. Never errors.
pub async fn summary_or_placeholder(directory: &dyn UserDirectory, id: &UserId) -> UserSummary {
    match directory.get_user(id).await {
        Ok(Some(summary)) => summary,
        Ok(None) => {
            warn!(user = %id, "user missing from directory, using placeholder");
            UserSummary::placeholder(id.clone())
        }
        Err(e) => {
            warn!(user = %id, error = %e, "directory lookup failed, using placeholder");
            UserSummary::placeholder(id.clone())
        }
    }
}

/// Expand both participants of `message`.
pub async fn enrich(directory: &dyn UserDirectory, message: ChatMessage) -> EnrichedMessage {
    let sender = summary_or_placeholder(directory, &message.sender_id).await;
    let receiver = summary_or_placeholder(directory, &message.receiver_id).await;
    EnrichedMessage::new(message, sender, receiver)
}
