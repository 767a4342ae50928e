// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The chat core talks to the rest of the social network only through these
//! traits. All of them use `#[async_trait]` for dynamic dispatch behind `Arc`.

pub mod adapter;
pub mod directory;
pub mod graph;
pub mod identity;
pub mod store;

pub use adapter::{PluginAdapter, StorageAdapter};
pub use directory::UserDirectory;
pub use graph::ConnectionsGraph;
pub use identity::IdentityValidator;
pub use store::MessageStore;
