// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted connector for driving a `ChatSession` without a network.
//!
//! Each `connect()` consumes the next scripted outcome (accepting once the
//! script is empty, unless [`MockConnector::refuse_all`] was called). Every
//! accepted link hands its server half to the test through
//! [`MockConnector::next_link`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use connectx_client::{Connector, Link};
use connectx_core::{ClientEvent, ConnectxError, ServerEvent};

const LINK_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Accept,
    Refuse,
    /// Never completes; exercises the connect timeout.
    Hang,
}

/// The server end of one accepted link.
///
/// Dropping it (or calling [`close`](ServerEnd::close)) looks like the server
/// going away.
pub struct ServerEnd {
    from_client: mpsc::Receiver<ClientEvent>,
    to_client: mpsc::Sender<ServerEvent>,
}

impl ServerEnd {
    /// Next event the client sent, or `None` once the client dropped the link.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.from_client.recv().await
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<ClientEvent> {
        tokio::time::timeout(timeout, self.from_client.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn send(&self, event: ServerEvent) -> bool {
        self.to_client.send(event).await.is_ok()
    }

    pub fn close(self) {}
}

/// A [`Connector`] whose outcomes are scripted by the test.
pub struct MockConnector {
    script: Mutex<VecDeque<Outcome>>,
    refuse_all: AtomicBool,
    attempts: AtomicUsize,
    accepted_tx: mpsc::UnboundedSender<ServerEnd>,
    accepted_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEnd>>,
}

impl MockConnector {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(VecDeque::new()),
            refuse_all: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            accepted_tx,
            accepted_rx: tokio::sync::Mutex::new(accepted_rx),
        }
    }

    fn push(&self, outcome: Outcome, times: usize) {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.extend(std::iter::repeat_n(outcome, times));
    }

    /// Refuse the next `times` attempts.
    pub fn refuse_next(&self, times: usize) {
        self.push(Outcome::Refuse, times);
    }

    /// Accept the next attempt. Useful after scripting refusals.
    pub fn accept_next(&self) {
        self.push(Outcome::Accept, 1);
    }

    /// Let the next `times` attempts hang forever.
    pub fn hang_next(&self, times: usize) {
        self.push(Outcome::Hang, times);
    }

    /// Refuse every attempt once the script runs out, or stop doing so.
    pub fn refuse_all(&self, refuse: bool) {
        self.refuse_all.store(refuse, Ordering::SeqCst);
    }

    /// Number of `connect()` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted link.
    pub async fn next_link(&self) -> Option<ServerEnd> {
        self.accepted_rx.lock().await.recv().await
    }

    /// Wait at most `timeout` for the next accepted link.
    pub async fn next_link_timeout(&self, timeout: Duration) -> Option<ServerEnd> {
        tokio::time::timeout(timeout, self.next_link())
            .await
            .ok()
            .flatten()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Link, ConnectxError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let outcome = scripted.unwrap_or(if self.refuse_all.load(Ordering::SeqCst) {
            Outcome::Refuse
        } else {
            Outcome::Accept
        });

        match outcome {
            Outcome::Refuse => Err(ConnectxError::transport("connection refused (mock)")),
            Outcome::Hang => std::future::pending().await,
            Outcome::Accept => {
                let (out_tx, out_rx) = mpsc::channel(LINK_CAPACITY);
                let (in_tx, in_rx) = mpsc::channel(LINK_CAPACITY);
                let server = ServerEnd {
                    from_client: out_rx,
                    to_client: in_tx,
                };
                self.accepted_tx
                    .send(server)
                    .map_err(|_| ConnectxError::transport("mock connector dropped"))?;
                Ok(Link {
                    outbound: out_tx,
                    inbound: in_rx,
                })
            }
        }
    }
}
