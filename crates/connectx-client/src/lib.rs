// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ConnectX chat client.
//!
//! - [`session`]: one owned connection with reconnect, join re-announcement
//!   and acknowledgement tracking.
//! - [`typing`]: outbound and inbound typing state machines.
//! - [`state`]: the view-state reducer a front end renders from.
//! - [`api`]: the REST read surface (history, conversations, mark-read).

pub mod api;
pub mod connector;
pub mod session;
pub mod state;
pub mod typing;

pub use api::ChatApi;
pub use connector::{Connector, Link, WsConnector};
pub use session::{backoff_delay, ChatSession, ConnectionState, PendingSend, SessionEvent};
pub use state::{ChatAction, ChatEntry, ChatUIState, CurrentChat, DeliveryStatus};
pub use typing::{TypingIndicator, TypingNotifier, TypingSignal};
