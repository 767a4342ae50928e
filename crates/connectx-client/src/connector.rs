// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport seam between the session manager and the network.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use connectx_core::{ClientEvent, ConnectxError, ServerEvent};

/// Queue depth of both directions of a [`Link`].
const LINK_CAPACITY: usize = 64;

/// One established connection to the chat server.
///
/// The link is alive while `inbound` yields events. When the server side
/// goes away `inbound` returns `None`; dropping `outbound` closes the
/// connection from the client side.
pub struct Link {
    pub outbound: mpsc::Sender<ClientEvent>,
    pub inbound: mpsc::Receiver<ServerEvent>,
}

/// Opens links to the chat server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Link, ConnectxError>;
}

/// Production connector speaking JSON frames over a WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Link, ConnectxError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ConnectxError::Transport {
                message: format!("failed to connect to {}: {e}", self.url),
                source: Some(Box::new(e)),
            })?;
        debug!(url = %self.url, "websocket established");

        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ClientEvent>(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<ServerEvent>(LINK_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
                let frame = match event.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "failed to encode client event");
                        continue;
                    }
                };
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerEvent::from_frame(text.as_str()) {
                        Ok(event) => {
                            if in_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "ignoring malformed server frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
