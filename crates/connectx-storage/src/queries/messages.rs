// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat log queries.
//!
//! Pair queries are symmetric: `(a, b)` and `(b, a)` address the same
//! conversation. Ordering is `created_at` then insertion order.

use connectx_core::types::{MessageId, UserId};
use connectx_core::ConnectxError;
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};
use crate::models::ChatMessage;

const COLUMNS: &str = "id, sender_id, receiver_id, body, read, created_at";

const PAIR_FILTER: &str = "(sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: MessageId(row.get(0)?),
        sender_id: UserId(row.get(1)?),
        receiver_id: UserId(row.get(2)?),
        body: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Append a message to the log.
pub async fn insert_message(db: &Database, msg: &ChatMessage) -> Result<(), ConnectxError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, body, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.id.0,
                    msg.sender_id.0,
                    msg.receiver_id.0,
                    msg.body,
                    msg.read,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Every message exchanged between `a` and `b`, oldest first.
pub async fn conversation_history(
    db: &Database,
    a: &UserId,
    b: &UserId,
) -> Result<Vec<ChatMessage>, ConnectxError> {
    let (a, b) = (a.0.clone(), b.0.clone());
    db.connection()
        .call(move |conn| -> Result<Vec<ChatMessage>, rusqlite::Error> {
            let sql = format!(
                "SELECT {COLUMNS} FROM messages WHERE {PAIR_FILTER}
                 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![a, b], from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent message between `a` and `b`, if any.
pub async fn last_message(
    db: &Database,
    a: &UserId,
    b: &UserId,
) -> Result<Option<ChatMessage>, ConnectxError> {
    let (a, b) = (a.0.clone(), b.0.clone());
    db.connection()
        .call(move |conn| -> Result<Option<ChatMessage>, rusqlite::Error> {
            let sql = format!(
                "SELECT {COLUMNS} FROM messages WHERE {PAIR_FILTER}
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query_map(params![a, b], from_row)?;
            rows.next().transpose()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of unread messages `sender` has sent to `receiver`.
pub async fn unread_count(
    db: &Database,
    receiver: &UserId,
    sender: &UserId,
) -> Result<u64, ConnectxError> {
    let (receiver, sender) = (receiver.0.clone(), sender.0.clone());
    let count = db
        .connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE receiver_id = ?1 AND sender_id = ?2 AND read = 0",
                params![receiver, sender],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(count.max(0) as u64)
}

/// Mark every unread `sender -> receiver` message as read.
///
/// Returns the number of rows that changed; already-read messages are not
/// touched, so repeating the call returns 0.
pub async fn mark_read(
    db: &Database,
    receiver: &UserId,
    sender: &UserId,
) -> Result<u64, ConnectxError> {
    let (receiver, sender) = (receiver.0.clone(), sender.0.clone());
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE messages SET read = 1
                 WHERE receiver_id = ?1 AND sender_id = ?2 AND read = 0",
                params![receiver, sender],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed as u64)
}

/// Mark unread `sender -> receiver` messages created at or before `until`.
pub async fn mark_read_until(
    db: &Database,
    receiver: &UserId,
    sender: &UserId,
    until: &str,
) -> Result<u64, ConnectxError> {
    let (receiver, sender, until) = (receiver.0.clone(), sender.0.clone(), until.to_string());
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE messages SET read = 1
                 WHERE receiver_id = ?1 AND sender_id = ?2 AND read = 0 AND created_at <= ?3",
                params![receiver, sender, until],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, from: &str, to: &str, body: &str, ts: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId(id.to_string()),
            sender_id: from.into(),
            receiver_id: to.into(),
            body: body.to_string(),
            read: false,
            created_at: ts.to_string(),
        }
    }

    #[tokio::test]
    async fn history_is_symmetric_and_ordered() {
        let (db, _dir) = setup_db().await;
        insert_message(&db, &make_msg("m1", "alice", "bob", "hi", "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        insert_message(&db, &make_msg("m2", "bob", "alice", "hey", "2026-01-01T00:00:02.000Z"))
            .await
            .unwrap();
        insert_message(&db, &make_msg("m3", "alice", "carol", "other", "2026-01-01T00:00:03.000Z"))
            .await
            .unwrap();

        let forward = conversation_history(&db, &"alice".into(), &"bob".into())
            .await
            .unwrap();
        let backward = conversation_history(&db, &"bob".into(), &"alice".into())
            .await
            .unwrap();
        assert_eq!(forward, backward);
        let ids: Vec<_> = forward.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let (db, _dir) = setup_db().await;
        let ts = "2026-01-01T00:00:00.000Z";
        for id in ["b-first", "a-second", "c-third"] {
            insert_message(&db, &make_msg(id, "alice", "bob", id, ts))
                .await
                .unwrap();
        }
        let history = conversation_history(&db, &"alice".into(), &"bob".into())
            .await
            .unwrap();
        let ids: Vec<_> = history.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, ["b-first", "a-second", "c-third"]);

        let last = last_message(&db, &"bob".into(), &"alice".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.id.0, "c-third");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn last_message_is_none_without_history() {
        let (db, _dir) = setup_db().await;
        let last = last_message(&db, &"alice".into(), &"bob".into())
            .await
            .unwrap();
        assert!(last.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_read_only_touches_receiver_side() {
        let (db, _dir) = setup_db().await;
        insert_message(&db, &make_msg("m1", "alice", "bob", "1", "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        insert_message(&db, &make_msg("m2", "alice", "bob", "2", "2026-01-01T00:00:02.000Z"))
            .await
            .unwrap();
        insert_message(&db, &make_msg("m3", "bob", "alice", "3", "2026-01-01T00:00:03.000Z"))
            .await
            .unwrap();

        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));
        assert_eq!(unread_count(&db, &bob, &alice).await.unwrap(), 2);
        assert_eq!(unread_count(&db, &alice, &bob).await.unwrap(), 1);

        assert_eq!(mark_read(&db, &bob, &alice).await.unwrap(), 2);
        assert_eq!(unread_count(&db, &bob, &alice).await.unwrap(), 0);
        assert_eq!(unread_count(&db, &alice, &bob).await.unwrap(), 1);

        // Monotonic: a second pass changes nothing.
        assert_eq!(mark_read(&db, &bob, &alice).await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_read_until_leaves_newer_messages_unread() {
        let (db, _dir) = setup_db().await;
        for (id, ts) in [
            ("m1", "2026-01-01T00:00:01.000Z"),
            ("m2", "2026-01-01T00:00:02.000Z"),
            ("m3", "2026-01-01T00:00:03.000Z"),
        ] {
            insert_message(&db, &make_msg(id, "alice", "bob", id, ts))
                .await
                .unwrap();
        }

        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));
        let changed = mark_read_until(&db, &bob, &alice, "2026-01-01T00:00:02.000Z")
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(unread_count(&db, &bob, &alice).await.unwrap(), 1);
        db.close().await.unwrap();
    }
}
