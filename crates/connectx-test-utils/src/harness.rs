// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end gateway testing.
//!
//! `GatewayHarness` serves the full router on an ephemeral localhost port
//! backed by a [`MemoryBackend`]. `WsTestClient` speaks the event protocol
//! over a real WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use connectx_config::model::ChatConfig;
use connectx_core::{ClientEvent, ConnectxError, SendRequest, ServerEvent, UserId};
use connectx_gateway::{Collaborators, GatewayState};

use crate::memory::MemoryBackend;

/// A running gateway on `127.0.0.1:<ephemeral>`.
pub struct GatewayHarness {
    pub addr: SocketAddr,
    pub backend: Arc<MemoryBackend>,
    pub state: GatewayState,
    shutdown: CancellationToken,
    server: Option<JoinHandle<Result<(), ConnectxError>>>,
}

impl GatewayHarness {
    /// Start with default chat settings.
    pub async fn start(backend: Arc<MemoryBackend>) -> Result<Self, ConnectxError> {
        Self::start_with(backend, ChatConfig::default()).await
    }

    pub async fn start_with(
        backend: Arc<MemoryBackend>,
        chat: ChatConfig,
    ) -> Result<Self, ConnectxError> {
        let shutdown = CancellationToken::new();
        let state = GatewayState::new(Collaborators::from_backend(backend.clone()), &chat)
            .with_health_probe(backend.clone())
            .with_shutdown(shutdown.clone());
        let listener = connectx_gateway::bind("127.0.0.1", 0).await?;
        let addr = listener.local_addr().map_err(|e| ConnectxError::Transport {
            message: format!("listener has no local address: {e}"),
            source: Some(Box::new(e)),
        })?;
        let server = tokio::spawn(connectx_gateway::serve(listener, state.clone()));
        Ok(Self {
            addr,
            backend,
            state,
            shutdown,
            server: Some(server),
        })
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Open a WebSocket without joining any room.
    pub async fn connect(&self) -> Result<WsTestClient, ConnectxError> {
        WsTestClient::connect(&self.ws_url()).await
    }

    /// Open a WebSocket and join `user`'s room, waiting until the join landed.
    pub async fn connect_as(&self, user: &str) -> Result<WsTestClient, ConnectxError> {
        let before = self.state.presence.room_size(&UserId::from(user));
        let mut client = self.connect().await?;
        client.join(user).await?;
        self.wait_for_room(user, before + 1).await?;
        Ok(client)
    }

    /// Poll until `user`'s room has `size` members.
    pub async fn wait_for_room(&self, user: &str, size: usize) -> Result<(), ConnectxError> {
        let user = UserId::from(user);
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            while self.state.presence.room_size(&user) != size {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(|_| ConnectxError::Timeout { duration: deadline })
    }

    /// Stop the server and wait for it to exit.
    pub async fn stop(mut self) -> Result<(), ConnectxError> {
        self.shutdown.cancel();
        if let Some(server) = self.server.take() {
            server
                .await
                .map_err(|e| ConnectxError::Internal(format!("server task failed: {e}")))??;
        }
        Ok(())
    }
}

impl Drop for GatewayHarness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A raw protocol client for gateway tests.
pub struct WsTestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    pub async fn connect(url: &str) -> Result<Self, ConnectxError> {
        let (stream, _) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| ConnectxError::Transport {
                    message: format!("test client failed to connect: {e}"),
                    source: Some(Box::new(e)),
                })?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ConnectxError> {
        self.send_raw(&event.to_frame()?).await
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, frame: &str) -> Result<(), ConnectxError> {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| ConnectxError::transport(format!("test client send failed: {e}")))
    }

    pub async fn join(&mut self, user: &str) -> Result<(), ConnectxError> {
        self.send(&ClientEvent::Join(user.into())).await
    }

    pub async fn send_message(
        &mut self,
        sender: &str,
        receiver: &str,
        body: &str,
        token: &str,
    ) -> Result<(), ConnectxError> {
        self.send(&ClientEvent::PrivateMessage(SendRequest {
            sender: sender.into(),
            receiver: receiver.into(),
            message: body.into(),
            token: token.into(),
        }))
        .await
    }

    /// Next server event, or `None` on close or after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<ServerEvent> {
        tokio::time::timeout(timeout, async {
            while let Some(frame) = self.stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Ok(event) = ServerEvent::from_frame(text.as_str()) {
                            return Some(event);
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => return None,
                    Ok(_) => {}
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Next server event within two seconds.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.recv_timeout(Duration::from_secs(2)).await
    }

    /// True if no event arrives within `window`.
    pub async fn is_quiet(&mut self, window: Duration) -> bool {
        self.recv_timeout(window).await.is_none()
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
