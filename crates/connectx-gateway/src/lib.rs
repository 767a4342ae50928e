// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for ConnectX private messaging.
//!
//! The gateway owns the presence rooms, runs the send pipeline for inbound
//! `private message` events and serves the REST read surface. Identity,
//! profiles, the connections graph and the chat log are reached through the
//! collaborator traits in `connectx-core`.

pub mod aggregator;
pub mod chat;
pub mod enrich;
pub mod handlers;
pub mod presence;
pub mod server;
pub mod ws;

pub use aggregator::ConversationAggregator;
pub use chat::ChatService;
pub use presence::{ConnId, PresenceRouter};
pub use server::{bind, router, serve, Collaborators, GatewayState, HealthState};
