// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connections graph queries.
//!
//! An edge is stored once, in the direction it was requested. Lookups check
//! both directions.

use std::str::FromStr;

use connectx_core::types::UserId;
use connectx_core::ConnectxError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{ConnectionEdge, ConnectionStatus};

/// Record a connection request from `from` to `to`.
///
/// If an edge between the two already exists in either direction, its id is
/// returned and nothing is inserted.
pub async fn request_connection(
    db: &Database,
    from: &UserId,
    to: &UserId,
) -> Result<String, ConnectxError> {
    upsert_edge(db, from, to, ConnectionStatus::Pending).await
}

/// Create an accepted edge directly, or accept the existing one.
pub async fn connect_users(db: &Database, a: &UserId, b: &UserId) -> Result<String, ConnectxError> {
    upsert_edge(db, a, b, ConnectionStatus::Accepted).await
}

async fn upsert_edge(
    db: &Database,
    from: &UserId,
    to: &UserId,
    status: ConnectionStatus,
) -> Result<String, ConnectxError> {
    let (from, to) = (from.0.clone(), to.0.clone());
    let new_id = uuid::Uuid::new_v4().to_string();
    let accept = status == ConnectionStatus::Accepted;
    let status = status.to_string();
    db.connection()
        .call(move |conn| -> Result<String, rusqlite::Error> {
            let tx = conn.transaction()?;
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM connections
                     WHERE (user_id = ?1 AND connection_id = ?2)
                        OR (user_id = ?2 AND connection_id = ?1)",
                    params![from, to],
                    |row| row.get(0),
                )
                .optional()?;
            let id = match existing {
                Some(id) => {
                    if accept {
                        tx.execute(
                            "UPDATE connections SET status = 'accepted' WHERE id = ?1",
                            params![id],
                        )?;
                    }
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO connections (id, user_id, connection_id, status)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![new_id, from, to, status],
                    )?;
                    new_id
                }
            };
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Accept a pending edge by id. Returns false when no such edge exists.
pub async fn accept_connection(db: &Database, id: &str) -> Result<bool, ConnectxError> {
    let id = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE connections SET status = 'accepted' WHERE id = ?1",
                params![id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed > 0)
}

/// Status of the edge between `a` and `b`, in either direction.
pub async fn connection_status(
    db: &Database,
    a: &UserId,
    b: &UserId,
) -> Result<Option<ConnectionStatus>, ConnectxError> {
    let (a, b) = (a.0.clone(), b.0.clone());
    let status = db
        .connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT status FROM connections
                 WHERE (user_id = ?1 AND connection_id = ?2)
                    OR (user_id = ?2 AND connection_id = ?1)
                 ORDER BY status = 'accepted' DESC LIMIT 1",
                params![a, b],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    status
        .map(|s| ConnectionStatus::from_str(&s).map_err(ConnectxError::storage))
        .transpose()
}

/// Accepted edges touching `user`, oldest first.
pub async fn accepted_connections(
    db: &Database,
    user: &UserId,
) -> Result<Vec<ConnectionEdge>, ConnectxError> {
    let user = user.0.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<ConnectionEdge>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, connection_id FROM connections
                 WHERE status = 'accepted' AND (user_id = ?1 OR connection_id = ?1)
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![user], |row| {
                Ok(ConnectionEdge {
                    id: row.get(0)?,
                    user_id: UserId(row.get(1)?),
                    connection_id: UserId(row.get(2)?),
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("c.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn pending_request_is_not_listed_until_accepted() {
        let (db, _dir) = setup_db().await;
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let id = request_connection(&db, &alice, &bob).await.unwrap();
        assert!(accepted_connections(&db, &alice).await.unwrap().is_empty());
        assert_eq!(
            connection_status(&db, &bob, &alice).await.unwrap(),
            Some(ConnectionStatus::Pending)
        );

        assert!(accept_connection(&db, &id).await.unwrap());
        let edges = accepted_connections(&db, &bob).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].other(&bob), Some(&alice));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn connect_users_is_idempotent_across_directions() {
        let (db, _dir) = setup_db().await;
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let first = connect_users(&db, &alice, &bob).await.unwrap();
        let second = connect_users(&db, &bob, &alice).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(accepted_connections(&db, &alice).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_edge_has_no_status() {
        let (db, _dir) = setup_db().await;
        let status = connection_status(&db, &"a".into(), &"b".into())
            .await
            .unwrap();
        assert!(status.is_none());
        assert!(!accept_connection(&db, "missing").await.unwrap());
        db.close().await.unwrap();
    }
}
