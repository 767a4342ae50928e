// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client chat session manager.
//!
//! A [`ChatSession`] owns at most one live [`Link`] and a driver task that
//! connects, re-announces the user with `join` after every (re)connect, and
//! reconnects with bounded exponential backoff when the link drops. Sends
//! fail fast while not connected; nothing is buffered for later.
//!
//! Acknowledgements are matched to sends in FIFO order: the server handles a
//! connection's events sequentially and answers every `private message` with
//! exactly one `message sent` or `error`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use connectx_config::model::ClientConfig;
use connectx_core::{
    ClientEvent, ConnectxError, EnrichedMessage, SendRequest, ServerEvent, TypingRequest, UserId,
};

use crate::connector::{Connector, Link};

/// Capacity of the session event broadcast.
const EVENT_CAPACITY: usize = 256;

/// Connection states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, or the link dropped and a reconnect is scheduled.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Joined and ready to send.
    Connected,
    /// Retries exhausted. Only [`ChatSession::reconnect`] leaves this state.
    Offline,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Offline => write!(f, "offline"),
        }
    }
}

/// Lifecycle and inbound events published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected { reason: String },
    Offline,
    Server(ServerEvent),
}

type AckSender = oneshot::Sender<Result<EnrichedMessage, ConnectxError>>;

/// Handle on one in-flight send.
#[derive(Debug)]
pub struct PendingSend {
    rx: oneshot::Receiver<Result<EnrichedMessage, ConnectxError>>,
}

impl PendingSend {
    /// Wait for the server's answer with no time limit.
    pub async fn wait(self) -> Result<EnrichedMessage, ConnectxError> {
        self.rx
            .await
            .map_err(|_| ConnectxError::transport("session closed before acknowledgement"))?
    }

    /// Wait for the server's answer for at most `timeout`.
    pub async fn confirm(self, timeout: Duration) -> Result<EnrichedMessage, ConnectxError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ConnectxError::Timeout { duration: timeout })?
    }
}

#[derive(Default)]
struct LinkSlot {
    outbound: Option<tokio::sync::mpsc::Sender<ClientEvent>>,
    pending: VecDeque<AckSender>,
}

struct Inner {
    user: UserId,
    token: String,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    slot: Mutex<LinkSlot>,
    reconnect: Notify,
    cancel: CancellationToken,
}

/// A user's connection to the chat server.
pub struct ChatSession {
    inner: Arc<Inner>,
    driver: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    pub fn new(
        user: UserId,
        token: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                user,
                token: token.into(),
                connector,
                config,
                state,
                events,
                slot: Mutex::new(LinkSlot::default()),
                reconnect: Notify::new(),
                cancel: CancellationToken::new(),
            }),
            driver: std::sync::Mutex::new(None),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    /// Start connecting in the background. Calling it again is a no-op.
    pub fn start(&self) {
        let Ok(mut driver) = self.driver.lock() else {
            return;
        };
        if driver.is_none() {
            let inner = self.inner.clone();
            *driver = Some(tokio::spawn(async move { inner.drive().await }));
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Observe state changes without polling.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive lifecycle and server events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the session reaches `target`, for at most `timeout`.
    pub async fn wait_for(
        &self,
        target: ConnectionState,
        timeout: Duration,
    ) -> Result<(), ConnectxError> {
        let mut rx = self.watch_state();
        tokio::time::timeout(timeout, rx.wait_for(|state| *state == target))
            .await
            .map_err(|_| ConnectxError::Timeout { duration: timeout })?
            .map_err(|_| ConnectxError::transport("session dropped"))?;
        Ok(())
    }

    /// Send a private message to `receiver`.
    ///
    /// Fails with [`ConnectxError::Offline`] unless connected. On success the
    /// returned [`PendingSend`] resolves with the server's acknowledgement.
    pub async fn send_message(
        &self,
        receiver: &UserId,
        body: impl Into<String>,
    ) -> Result<PendingSend, ConnectxError> {
        let event = ClientEvent::PrivateMessage(SendRequest {
            sender: self.inner.user.clone(),
            receiver: receiver.clone(),
            message: body.into(),
            token: self.inner.token.clone(),
        });

        let outbound = self
            .inner
            .slot
            .lock()
            .await
            .outbound
            .clone()
            .ok_or(ConnectxError::Offline)?;
        // Wait for link capacity without the slot lock so inbound acks keep
        // flowing while the link is full.
        let permit = outbound.reserve().await.map_err(|_| ConnectxError::Offline)?;

        let (tx, rx) = oneshot::channel();
        let mut slot = self.inner.slot.lock().await;
        // The link may have been replaced while waiting.
        if !slot
            .outbound
            .as_ref()
            .is_some_and(|current| current.same_channel(&outbound))
        {
            return Err(ConnectxError::Offline);
        }
        slot.pending.push_back(tx);
        permit.send(event);
        Ok(PendingSend { rx })
    }

    /// Tell `receiver` the user started typing.
    pub async fn send_typing(&self, receiver: &UserId) -> Result<(), ConnectxError> {
        self.send_unacked(ClientEvent::Typing(self.typing_request(receiver)))
            .await
    }

    /// Tell `receiver` the user stopped typing.
    pub async fn send_stop_typing(&self, receiver: &UserId) -> Result<(), ConnectxError> {
        self.send_unacked(ClientEvent::StopTyping(self.typing_request(receiver)))
            .await
    }

    fn typing_request(&self, receiver: &UserId) -> TypingRequest {
        TypingRequest {
            sender: self.inner.user.clone(),
            receiver: receiver.clone(),
        }
    }

    async fn send_unacked(&self, event: ClientEvent) -> Result<(), ConnectxError> {
        let outbound = self.inner.slot.lock().await.outbound.clone();
        match outbound {
            Some(outbound) => outbound
                .send(event)
                .await
                .map_err(|_| ConnectxError::Offline),
            None => Err(ConnectxError::Offline),
        }
    }

    /// Leave the offline state and start a fresh round of attempts.
    ///
    /// Has no effect in any other state.
    pub fn reconnect(&self) {
        if self.state() == ConnectionState::Offline {
            info!(user = %self.inner.user, "manual reconnect requested");
            self.inner.reconnect.notify_one();
        }
    }

    /// Stop the driver, close the link and fail every pending send.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.driver.lock().ok().and_then(|mut d| d.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.drop_link("session shut down").await;
        self.inner.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

/// Delay before reconnect attempt number `step` (1-based).
///
/// `reconnect_delay_ms * 2^(step - 1)`, capped at `max_reconnect_delay_ms`,
/// then scaled by `1 + reconnect_jitter * sample` where `sample` lies in
/// `[-1, 1]`. The result never exceeds the cap.
pub fn backoff_delay(config: &ClientConfig, step: u32, sample: f64) -> Duration {
    let exp = step.saturating_sub(1).min(20);
    let base = config
        .reconnect_delay_ms
        .saturating_mul(1u64 << exp)
        .min(config.max_reconnect_delay_ms) as f64;
    let jittered = base * (1.0 + config.reconnect_jitter * sample.clamp(-1.0, 1.0));
    let capped = jittered.clamp(0.0, config.max_reconnect_delay_ms as f64);
    Duration::from_millis(capped.round() as u64)
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn drive(self: Arc<Self>) {
        let mut failures: u32 = 0;
        let mut after_loss = false;

        loop {
            let step = if after_loss { failures + 1 } else { failures };
            if step > 0 {
                let sample = rand::thread_rng().gen_range(-1.0..=1.0);
                let delay = backoff_delay(&self.config, step, sample);
                debug!(step, delay_ms = delay.as_millis() as u64, "waiting before reconnect");
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            self.set_state(ConnectionState::Connecting);
            let Some(link) = self.attempt().await else {
                if self.cancel.is_cancelled() {
                    return;
                }
                failures += 1;
                if failures >= self.config.max_reconnect_attempts {
                    warn!(
                        user = %self.user,
                        attempts = failures,
                        "reconnect attempts exhausted, going offline"
                    );
                    self.set_state(ConnectionState::Offline);
                    self.publish(SessionEvent::Offline);
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = self.reconnect.notified() => {}
                    }
                    failures = 0;
                    after_loss = false;
                } else {
                    self.set_state(ConnectionState::Disconnected);
                }
                continue;
            };

            failures = 0;
            let reason = self.run_link(link).await;
            self.drop_link(&reason).await;
            if self.cancel.is_cancelled() {
                return;
            }
            info!(user = %self.user, reason = %reason, "connection lost");
            self.set_state(ConnectionState::Disconnected);
            self.publish(SessionEvent::Disconnected { reason });
            after_loss = true;
        }
    }

    /// One bounded connection attempt that ends with the user joined.
    async fn attempt(&self) -> Option<Link> {
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            result = tokio::time::timeout(timeout, self.connector.connect()) => result,
        };
        let link = match result {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                warn!(error = %e, "connection attempt failed");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = self.config.connect_timeout_ms, "connection attempt timed out");
                return None;
            }
        };

        // Join goes out before any queued send can use the link.
        if link
            .outbound
            .send(ClientEvent::Join(self.user.clone()))
            .await
            .is_err()
        {
            warn!("link closed before join");
            return None;
        }
        Some(link)
    }

    /// Publish the link and pump inbound events until it closes or the
    /// session is cancelled. Returns the reason the link ended.
    async fn run_link(&self, link: Link) -> String {
        let Link {
            outbound,
            mut inbound,
        } = link;
        self.slot.lock().await.outbound = Some(outbound);
        self.set_state(ConnectionState::Connected);
        self.publish(SessionEvent::Connected);
        info!(user = %self.user, "connected");

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return "session shut down".to_string(),
                event = inbound.recv() => event,
            };
            let Some(event) = event else {
                return "server closed the connection".to_string();
            };
            self.on_server_event(&event).await;
            self.publish(SessionEvent::Server(event));
        }
    }

    async fn on_server_event(&self, event: &ServerEvent) {
        let outcome = match event {
            ServerEvent::MessageSent(message) => Ok(message.clone()),
            ServerEvent::Error(message) => Err(ConnectxError::Rejected(message.clone())),
            _ => return,
        };
        let waiter = self.slot.lock().await.pending.pop_front();
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => debug!(event = event.name(), "acknowledgement with no pending send"),
        }
    }

    /// Forget the current link and reject every send still waiting on it.
    async fn drop_link(&self, reason: &str) {
        let pending = {
            let mut slot = self.slot.lock().await;
            slot.outbound = None;
            std::mem::take(&mut slot.pending)
        };
        for waiter in pending {
            let _ = waiter.send(Err(ConnectxError::transport(format!(
                "connection lost before acknowledgement: {reason}"
            ))));
        }
    }
}
