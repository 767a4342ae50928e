// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User directory and session token lookups.

use connectx_core::types::UserId;
use connectx_core::ConnectxError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::UserSummary;

fn from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        username: row.get(2)?,
        profile_picture: row.get(3)?,
    })
}

/// Insert or update a user. A `Some` token replaces the stored one; `None`
/// leaves it unchanged.
pub async fn upsert_user(
    db: &Database,
    user: &UserSummary,
    token: Option<&str>,
) -> Result<(), ConnectxError> {
    let user = user.clone();
    let token = token.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO users (id, name, username, profile_picture, token)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    username = excluded.username,
                    profile_picture = excluded.profile_picture,
                    token = COALESCE(excluded.token, users.token)",
                params![user.id.0, user.name, user.username, user.profile_picture, token],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by id.
pub async fn get_user(db: &Database, id: &UserId) -> Result<Option<UserSummary>, ConnectxError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<UserSummary>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, username, profile_picture FROM users WHERE id = ?1",
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve a session token to its owner.
pub async fn find_by_token(
    db: &Database,
    token: &str,
) -> Result<Option<UserSummary>, ConnectxError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<UserSummary>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, username, profile_picture FROM users WHERE token = ?1",
                params![token],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All users ordered by username.
pub async fn list_users(db: &Database) -> Result<Vec<UserSummary>, ConnectxError> {
    db.connection()
        .call(|conn| -> Result<Vec<UserSummary>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, name, username, profile_picture FROM users ORDER BY username ASC",
            )?;
            let rows = stmt.query_map([], from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
