// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-side views over the chat log: conversation list, history and
//! explicit read acknowledgement.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use connectx_core::{
    ConnectionsGraph, Conversation, ConnectxError, EnrichedMessage, MessageStore, UserDirectory,
    UserId,
};
use tracing::{debug, warn};

use crate::enrich;

/// Builds conversation summaries and history for one viewer at a time.
pub struct ConversationAggregator {
    directory: Arc<dyn UserDirectory>,
    graph: Arc<dyn ConnectionsGraph>,
    store: Arc<dyn MessageStore>,
}

impl ConversationAggregator {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        graph: Arc<dyn ConnectionsGraph>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            directory,
            graph,
            store,
        }
    }

    /// One entry per accepted connection of `viewer`, most recent activity
    /// first. Peers with no messages keep their graph order at the end.
    ///
    /// Edges that do not touch the viewer or whose peer is missing from the
    /// directory are skipped, as are peers whose message lookups fail. Only a
    /// failure to read the graph itself is an error.
    pub async fn conversations(&self, viewer: &UserId) -> Result<Vec<Conversation>, ConnectxError> {
        let edges = self.graph.accepted_connections(viewer).await?;
        let mut seen = HashSet::new();
        let mut conversations = Vec::with_capacity(edges.len());

        for edge in &edges {
            let Some(peer) = edge.other(viewer) else {
                warn!(edge = %edge.id, viewer = %viewer, "edge does not involve viewer, skipping");
                continue;
            };
            if !seen.insert(peer.clone()) {
                continue;
            }

            let user = match self.directory.get_user(peer).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!(edge = %edge.id, peer = %peer, "connected user not found, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "directory lookup failed, skipping");
                    continue;
                }
            };

            let last_message = match self.store.last_message(viewer, peer).await {
                Ok(last) => last,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "last message lookup failed, skipping");
                    continue;
                }
            };
            let unread_count = match self.store.unread_count(viewer, peer).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "unread count failed, skipping");
                    continue;
                }
            };

            conversations.push(Conversation {
                user,
                last_message,
                unread_count,
            });
        }

        // Stable sort keeps graph order among peers without messages.
        conversations.sort_by(|a, b| match (&a.last_message, &b.last_message) {
            (Some(x), Some(y)) => y.created_at.cmp(&x.created_at),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        debug!(viewer = %viewer, count = conversations.len(), "conversations built");
        Ok(conversations)
    }

    /// The full conversation between `viewer` and `peer`, oldest first.
    ///
    /// Requires an accepted connection. After the messages are read, the
    /// unread `peer -> viewer` messages among them are marked read; the
    /// returned messages carry the flags as they were before that transition.
    pub async fn history(
        &self,
        viewer: &UserId,
        peer: &UserId,
    ) -> Result<Vec<EnrichedMessage>, ConnectxError> {
        if !self.graph.are_connected(viewer, peer).await? {
            return Err(ConnectxError::Forbidden(
                "you can only chat with accepted connections".into(),
            ));
        }

        let messages = self.store.history(viewer, peer).await?;
        let read_until = messages.last().map(|m| m.created_at.clone());
        let viewer_summary = enrich::summary_or_placeholder(self.directory.as_ref(), viewer).await;
        let peer_summary = enrich::summary_or_placeholder(self.directory.as_ref(), peer).await;

        let enriched = messages
            .into_iter()
            .map(|message| {
                let (sender, receiver) = if &message.sender_id == viewer {
                    (viewer_summary.clone(), peer_summary.clone())
                } else {
                    (peer_summary.clone(), viewer_summary.clone())
                };
                EnrichedMessage::new(message, sender, receiver)
            })
            .collect();

        // Only what was returned counts as seen.
        if let Some(until) = read_until {
            match self.store.mark_read_until(viewer, peer, &until).await {
                Ok(changed) => {
                    debug!(viewer = %viewer, peer = %peer, changed, "history marked read")
                }
                Err(e) => {
                    warn!(viewer = %viewer, peer = %peer, error = %e, "failed to mark history read")
                }
            }
        }
        Ok(enriched)
    }

    /// Mark every unread `sender -> viewer` message as read.
    pub async fn mark_read(&self, viewer: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
        self.store.mark_read(viewer, sender).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectx_core::ChatMessage;
    use connectx_test_utils::MemoryBackend;

    fn aggregator(backend: &Arc<MemoryBackend>) -> ConversationAggregator {
        ConversationAggregator::new(backend.clone(), backend.clone(), backend.clone())
    }

    fn backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        for (id, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol"), ("dave", "Dave")] {
            backend.add_user(id, name, &format!("tok-{id}-0000001"));
        }
        backend
    }

    #[tokio::test]
    async fn conversations_are_ordered_by_recent_activity() {
        let backend = backend();
        backend.connect("alice", "bob");
        backend.connect("carol", "alice");
        backend.connect("alice", "dave");
        backend.seed_message("bob", "alice", "old", "2026-01-01T00:00:01.000Z");
        backend.seed_message("alice", "carol", "new", "2026-01-01T00:00:05.000Z");

        let list = aggregator(&backend)
            .conversations(&"alice".into())
            .await
            .unwrap();
        let order: Vec<_> = list.iter().map(|c| c.user.id.as_str()).collect();
        assert_eq!(order, ["carol", "bob", "dave"]);
        assert_eq!(list[1].unread_count, 1);
        assert_eq!(list[0].unread_count, 0);
        assert!(list[2].last_message.is_none());
    }

    #[tokio::test]
    async fn malformed_and_duplicate_edges_are_skipped() {
        let backend = backend();
        backend.connect("alice", "bob");
        backend.connect("bob", "alice");
        backend.connect("alice", "ghost");
        backend.add_raw_edge("alice", "carol", "dave");

        let list = aggregator(&backend)
            .conversations(&"alice".into())
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user.id, UserId::from("bob"));
    }

    #[tokio::test]
    async fn per_peer_store_failure_skips_that_peer() {
        let backend = backend();
        backend.connect("alice", "bob");
        backend.connect("alice", "carol");
        backend.fail_reads_with("carol");

        let list = aggregator(&backend)
            .conversations(&"alice".into())
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user.id, UserId::from("bob"));
    }

    #[tokio::test]
    async fn history_requires_connection() {
        let backend = backend();
        let err = aggregator(&backend)
            .history(&"alice".into(), &"bob".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectxError::Forbidden(_)));
    }

    #[tokio::test]
    async fn history_is_ordered_and_clears_unread() {
        let backend = backend();
        backend.connect("alice", "bob");
        backend.seed_message("bob", "alice", "first", "2026-01-01T00:00:01.000Z");
        backend.seed_message("alice", "bob", "second", "2026-01-01T00:00:02.000Z");
        backend.seed_message("bob", "alice", "third", "2026-01-01T00:00:03.000Z");
        let agg = aggregator(&backend);
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let history = agg.history(&alice, &bob).await.unwrap();
        let bodies: Vec<_> = history.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second", "third"]);
        assert_eq!(history[0].sender.name, "Bob");
        assert_eq!(history[1].sender.name, "Alice");

        let list = agg.conversations(&alice).await.unwrap();
        assert_eq!(list[0].unread_count, 0);
        // Bob's own unread messages from Alice are untouched.
        let bob_view = agg.conversations(&bob).await.unwrap();
        assert_eq!(bob_view[0].unread_count, 1);
    }

    /// Store whose `history` lets another message land right after the read.
    struct ArrivesDuringHistory {
        inner: Arc<MemoryBackend>,
    }

    #[async_trait::async_trait]
    impl MessageStore for ArrivesDuringHistory {
        async fn insert_message(&self, message: &ChatMessage) -> Result<(), ConnectxError> {
            self.inner.insert_message(message).await
        }

        async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, ConnectxError> {
            let history = self.inner.history(a, b).await?;
            self.inner.seed_message("bob", "alice", "late", "2026-01-01T00:00:09.000Z");
            Ok(history)
        }

        async fn last_message(
            &self,
            a: &UserId,
            b: &UserId,
        ) -> Result<Option<ChatMessage>, ConnectxError> {
            self.inner.last_message(a, b).await
        }

        async fn unread_count(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
            self.inner.unread_count(receiver, sender).await
        }

        async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
            self.inner.mark_read(receiver, sender).await
        }

        async fn mark_read_until(
            &self,
            receiver: &UserId,
            sender: &UserId,
            until: &str,
        ) -> Result<u64, ConnectxError> {
            self.inner.mark_read_until(receiver, sender, until).await
        }
    }

    #[tokio::test]
    async fn message_arriving_during_history_stays_unread() {
        let backend = backend();
        backend.connect("alice", "bob");
        backend.seed_message("bob", "alice", "seen", "2026-01-01T00:00:01.000Z");
        let store = Arc::new(ArrivesDuringHistory {
            inner: backend.clone(),
        });
        let agg = ConversationAggregator::new(backend.clone(), backend.clone(), store);
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let history = agg.history(&alice, &bob).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(backend.unread_count(&alice, &bob).await.unwrap(), 1);
        let unread: Vec<_> = backend
            .messages()
            .into_iter()
            .filter(|m| !m.read)
            .map(|m| m.body)
            .collect();
        assert_eq!(unread, ["late"]);
    }

    #[tokio::test]
    async fn mark_read_reports_count_and_is_monotonic() {
        let backend = backend();
        backend.seed_message("bob", "alice", "1", "2026-01-01T00:00:01.000Z");
        backend.seed_message("bob", "alice", "2", "2026-01-01T00:00:02.000Z");
        let agg = aggregator(&backend);
        assert_eq!(agg.mark_read(&"alice".into(), &"bob".into()).await.unwrap(), 2);
        assert_eq!(agg.mark_read(&"alice".into(), &"bob".into()).await.unwrap(), 0);
    }
}
