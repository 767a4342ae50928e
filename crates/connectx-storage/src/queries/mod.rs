// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions. Each takes a [`Database`](crate::Database) and
//! runs on its background thread.

pub mod connections;
pub mod messages;
pub mod users;
