// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for ConnectX.
//!
//! A single `tokio-rusqlite` connection serializes all access on one
//! background thread. [`SqliteStorage`] implements every collaborator trait
//! the chat core needs (identity, directory, connections graph and message
//! store) so the server can run without an external application behind it.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::ConnectionStatus;
