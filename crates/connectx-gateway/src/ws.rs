// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint speaking the chat event protocol.
//!
//! Each connection gets a writer task fed by a bounded outbox and a reader
//! loop that handles inbound events one at a time. Frames that fail to
//! decode are logged and dropped without an `error` reply, so every `error`
//! a client sees corresponds to one of its sends.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use connectx_core::{ClientEvent, ServerEvent};

use crate::presence::ConnId;
use crate::server::GatewayState;

/// How long the writer may keep flushing after the reader loop ends.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn: ConnId = uuid::Uuid::new_v4().to_string();

    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.outbox_capacity);
    state.presence.register(conn.clone(), tx);
    debug!(conn = %conn, "websocket connected");

    let writer_conn = conn.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(conn = %writer_conn, error = %e, "failed to encode event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        let next = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            next = ws_receiver.next() => next,
        };
        let Some(Ok(msg)) = next else { break };

        match msg {
            Message::Text(text) => match ClientEvent::from_frame(text.as_str()) {
                Ok(event) => state.chat.handle_event(&conn, event).await,
                Err(e) => warn!(conn = %conn, error = %e, "ignoring malformed frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Dropping the presence entry closes the outbox; the writer drains it.
    state.presence.leave(&conn);
    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        abort.abort();
    }
    debug!(conn = %conn, "websocket disconnected");
}
