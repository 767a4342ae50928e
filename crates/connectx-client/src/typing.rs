// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typing indicator state machines.
//!
//! Both machines are driven by explicit timestamps so callers decide how time
//! passes: the chat shell feeds them `Instant::now()` and sleeps until
//! [`deadline`](TypingNotifier::deadline), tests feed them fixed instants.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use connectx_core::UserId;

/// What the local user's typing activity should put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Outbound side: turns keystrokes into `typing` / `stop typing` events.
///
/// The first keystroke after an idle period yields [`TypingSignal::Start`].
/// Further keystrokes only push the quiet deadline out. Once the quiet period
/// passes without a keystroke, or the message is sent, the notifier yields
/// [`TypingSignal::Stop`].
#[derive(Debug, Clone)]
pub struct TypingNotifier {
    quiet: Duration,
    last_keystroke: Option<Instant>,
}

impl TypingNotifier {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_keystroke: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.last_keystroke.is_some()
    }

    pub fn keystroke(&mut self, now: Instant) -> Option<TypingSignal> {
        let was_active = self.last_keystroke.replace(now).is_some();
        (!was_active).then_some(TypingSignal::Start)
    }

    /// Yields `Stop` once the quiet period has elapsed since the last keystroke.
    pub fn tick(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_keystroke = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    pub fn message_sent(&mut self) -> Option<TypingSignal> {
        self.last_keystroke.take().map(|_| TypingSignal::Stop)
    }

    /// When the pending `Stop` is due, if typing is active.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_keystroke.map(|at| at + self.quiet)
    }
}

/// Inbound side: which peers are currently shown as typing.
///
/// A peer is typing from its `typing` event until its `stop typing` event,
/// a disconnect, or a quiet period without a renewed `typing`, whichever
/// comes first.
#[derive(Debug, Clone)]
pub struct TypingIndicator {
    quiet: Duration,
    expires: HashMap<UserId, Instant>,
}

impl TypingIndicator {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            expires: HashMap::new(),
        }
    }

    pub fn on_typing(&mut self, sender: UserId, now: Instant) {
        self.expires.insert(sender, now + self.quiet);
    }

    pub fn on_stop(&mut self, sender: &UserId) -> bool {
        self.expires.remove(sender).is_some()
    }

    /// The connection dropped: indicators cannot be trusted any more.
    pub fn on_disconnect(&mut self) {
        self.expires.clear();
    }

    /// Drop expired indicators and return the peers that stopped typing.
    pub fn tick(&mut self, now: Instant) -> Vec<UserId> {
        let expired: Vec<UserId> = self
            .expires
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(user, _)| user.clone())
            .collect();
        for user in &expired {
            self.expires.remove(user);
        }
        expired
    }

    pub fn is_typing(&self, sender: &UserId, now: Instant) -> bool {
        self.expires
            .get(sender)
            .is_some_and(|deadline| now < *deadline)
    }

    /// The earliest pending expiry.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expires.values().min().copied()
    }
}
