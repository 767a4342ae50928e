// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The full client stack (session, WebSocket connector, REST API) against a
//! live gateway.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use connectx_client::{
    ChatAction, ChatApi, ChatSession, ChatUIState, ConnectionState, SessionEvent, WsConnector,
};
use connectx_config::model::{ClientConfig, StorageConfig};
use connectx_core::{ConnectxError, ServerEvent, StorageAdapter, UserId, UserSummary};
use connectx_gateway::{Collaborators, GatewayState};
use connectx_storage::SqliteStorage;
use connectx_test_utils::{GatewayHarness, MemoryBackend};

const ALICE: &str = "tok-alice-0001";
const BOB: &str = "tok-bob-000001";
const WAIT: Duration = Duration::from_secs(5);

fn client_config(server_url: String, api_url: String) -> ClientConfig {
    ClientConfig {
        server_url,
        api_url,
        max_reconnect_attempts: 2,
        reconnect_delay_ms: 50,
        max_reconnect_delay_ms: 200,
        reconnect_jitter: 0.0,
        connect_timeout_ms: 2000,
        ack_timeout_ms: 2000,
        typing_quiet_ms: 200,
    }
}

fn session(config: &ClientConfig, user: &str, token: &str) -> ChatSession {
    let connector = Arc::new(WsConnector::new(config.server_url.clone()));
    ChatSession::new(user.into(), token, connector, config.clone())
}

async fn next_server_event(events: &mut broadcast::Receiver<SessionEvent>) -> ServerEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Server(event)) => return event,
                Ok(_) => continue,
                Err(e) => panic!("session events closed: {e}"),
            }
        }
    })
    .await
    .expect("no server event arrived")
}

async fn memory_harness() -> GatewayHarness {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("alice", "Alice", ALICE);
    backend.add_user("bob", "Bob", BOB);
    backend.connect("alice", "bob");
    GatewayHarness::start(backend).await.unwrap()
}

#[tokio::test]
async fn sessions_exchange_messages_and_api_reflects_unread() {
    let h = memory_harness().await;
    let config = client_config(h.ws_url(), h.http_url());

    let alice = session(&config, "alice", ALICE);
    let bob = session(&config, "bob", BOB);
    let mut bob_events = bob.subscribe();
    alice.start();
    bob.start();
    alice.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    bob.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    h.wait_for_room("bob", 1).await.unwrap();

    let pending = alice.send_message(&"bob".into(), "hi bob").await.unwrap();
    let acked = pending.confirm(WAIT).await.unwrap();
    assert_eq!(acked.body, "hi bob");
    assert_eq!(acked.sender.name, "Alice");

    match next_server_event(&mut bob_events).await {
        ServerEvent::PrivateMessage(message) => assert_eq!(message, acked),
        other => panic!("unexpected event: {other:?}"),
    }

    let bob_api = ChatApi::new(&config.api_url, BOB).unwrap();
    let conversations = bob_api.conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].user.id, UserId::from("alice"));
    assert_eq!(conversations[0].unread_count, 1);

    let history = bob_api.history(&"alice".into()).await.unwrap();
    assert_eq!(history.len(), 1);
    let conversations = bob_api.conversations().await.unwrap();
    assert_eq!(conversations[0].unread_count, 0);

    alice.shutdown().await;
    bob.shutdown().await;
    h.stop().await.unwrap();
}

#[tokio::test]
async fn live_message_into_an_open_chat_is_marked_read() {
    let h = memory_harness().await;
    let config = client_config(h.ws_url(), h.http_url());

    let alice = session(&config, "alice", ALICE);
    let bob = session(&config, "bob", BOB);
    let mut bob_events = bob.subscribe();
    alice.start();
    bob.start();
    alice.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    bob.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    h.wait_for_room("bob", 1).await.unwrap();

    // Bob has the chat with alice open, as the shell does after /open.
    let bob_api = ChatApi::new(&config.api_url, BOB).unwrap();
    let mut ui = ChatUIState::new("bob".into());
    let history = bob_api.history(&"alice".into()).await.unwrap();
    ui.apply(ChatAction::ChatOpened {
        peer: UserSummary::placeholder("alice".into()),
        history,
    });

    alice
        .send_message(&"bob".into(), "while open")
        .await
        .unwrap()
        .confirm(WAIT)
        .await
        .unwrap();
    let message = match next_server_event(&mut bob_events).await {
        ServerEvent::PrivateMessage(message) => message,
        other => panic!("unexpected event: {other:?}"),
    };
    assert!(ui.should_mark_read(&message));
    ui.apply(ChatAction::MessageReceived(message));
    assert_eq!(bob_api.mark_read(&"alice".into()).await.unwrap(), 1);
    ui.apply(ChatAction::MarkedRead {
        sender: "alice".into(),
    });

    let conversations = bob_api.conversations().await.unwrap();
    assert_eq!(conversations[0].unread_count, 0);
    assert!(ui.current_chat.as_ref().unwrap().messages[0].read);

    alice.shutdown().await;
    bob.shutdown().await;
    h.stop().await.unwrap();
}

#[tokio::test]
async fn unconnected_peer_send_is_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("alice", "Alice", ALICE);
    backend.add_user("carol", "Carol", "tok-carol-0001");
    let h = GatewayHarness::start(backend.clone()).await.unwrap();
    let config = client_config(h.ws_url(), h.http_url());

    let alice = session(&config, "alice", ALICE);
    alice.start();
    alice.wait_for(ConnectionState::Connected, WAIT).await.unwrap();

    let pending = alice.send_message(&"carol".into(), "hello?").await.unwrap();
    let err = pending.confirm(WAIT).await.unwrap_err();
    assert!(matches!(err, ConnectxError::Rejected(_)), "got {err:?}");
    assert!(backend.messages().is_empty());

    alice.shutdown().await;
    h.stop().await.unwrap();
}

#[tokio::test]
async fn typing_reaches_the_peer_session() {
    let h = memory_harness().await;
    let config = client_config(h.ws_url(), h.http_url());

    let alice = session(&config, "alice", ALICE);
    let bob = session(&config, "bob", BOB);
    let mut bob_events = bob.subscribe();
    alice.start();
    bob.start();
    alice.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    bob.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    h.wait_for_room("bob", 1).await.unwrap();

    alice.send_typing(&"bob".into()).await.unwrap();
    match next_server_event(&mut bob_events).await {
        ServerEvent::Typing(notice) => assert_eq!(notice.sender, UserId::from("alice")),
        other => panic!("unexpected event: {other:?}"),
    }
    alice.send_stop_typing(&"bob".into()).await.unwrap();
    match next_server_event(&mut bob_events).await {
        ServerEvent::StopTyping(notice) => assert_eq!(notice.sender, UserId::from("alice")),
        other => panic!("unexpected event: {other:?}"),
    }

    alice.shutdown().await;
    bob.shutdown().await;
    h.stop().await.unwrap();
}

#[tokio::test]
async fn server_shutdown_eventually_takes_session_offline() {
    let h = memory_harness().await;
    let config = client_config(h.ws_url(), h.http_url());

    let alice = session(&config, "alice", ALICE);
    let mut events = alice.subscribe();
    alice.start();
    alice.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    h.stop().await.unwrap();

    let saw_offline = tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Offline) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(saw_offline);
    assert_eq!(alice.state(), ConnectionState::Offline);
    assert!(matches!(
        alice.send_message(&"bob".into(), "anyone?").await,
        Err(ConnectxError::Offline)
    ));

    alice.shutdown().await;
}

#[tokio::test]
async fn sqlite_backed_gateway_persists_messages() {
    let dir = tempfile::tempdir().unwrap();
    let storage_config = StorageConfig {
        database_path: dir.path().join("chat.db").display().to_string(),
        ..StorageConfig::default()
    };
    let storage = Arc::new(SqliteStorage::new(storage_config));
    storage.initialize().await.unwrap();
    for (id, name, token) in [("alice", "Alice", ALICE), ("bob", "Bob", BOB)] {
        let user = UserSummary {
            id: id.into(),
            name: name.into(),
            username: id.into(),
            profile_picture: None,
        };
        storage.add_user(&user, Some(token)).await.unwrap();
    }
    storage
        .connect_users(&"alice".into(), &"bob".into())
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let state = GatewayState::new(
        Collaborators::from_backend(storage.clone()),
        &Default::default(),
    )
    .with_health_probe(storage.clone())
    .with_shutdown(shutdown.clone());
    let listener = connectx_gateway::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(connectx_gateway::serve(listener, state));

    let config = client_config(format!("ws://{addr}/ws"), format!("http://{addr}"));
    let alice = session(&config, "alice", ALICE);
    alice.start();
    alice.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    let acked = alice
        .send_message(&"bob".into(), "stored")
        .await
        .unwrap()
        .confirm(WAIT)
        .await
        .unwrap();
    alice.shutdown().await;

    let bob_api = ChatApi::new(&config.api_url, BOB).unwrap();
    let history = bob_api.history(&"alice".into()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, acked.id);
    assert_eq!(history[0].receiver.name, "Bob");
    assert_eq!(bob_api.mark_read(&"alice".into()).await.unwrap(), 0);
    assert_eq!(bob_api.status().await.unwrap(), "Chat service operational");

    shutdown.cancel();
    server.await.unwrap().unwrap();
    storage.close().await.unwrap();
}
