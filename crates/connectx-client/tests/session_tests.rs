// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session manager tests over a scripted connector with paused time.

use std::sync::Arc;
use std::time::Duration;

use connectx_client::{ChatSession, ConnectionState, SessionEvent};
use connectx_config::model::ClientConfig;
use connectx_core::{
    ChatMessage, ClientEvent, ConnectxError, EnrichedMessage, ServerEvent, TypingNotice,
    UserId, UserSummary,
};
use connectx_test_utils::{MockConnector, ServerEnd};

const WAIT: Duration = Duration::from_secs(60);

fn config() -> ClientConfig {
    ClientConfig {
        max_reconnect_attempts: 3,
        reconnect_delay_ms: 100,
        max_reconnect_delay_ms: 1000,
        reconnect_jitter: 0.0,
        connect_timeout_ms: 1000,
        ..ClientConfig::default()
    }
}

fn session(connector: &Arc<MockConnector>) -> ChatSession {
    ChatSession::new("alice".into(), "tok-alice-0001", connector.clone(), config())
}

fn enriched(from: &str, to: &str, body: &str) -> EnrichedMessage {
    EnrichedMessage::new(
        ChatMessage::new(from.into(), to.into(), body),
        UserSummary::placeholder(from.into()),
        UserSummary::placeholder(to.into()),
    )
}

/// Start the session and return the server end after the join arrived.
async fn connected(session: &ChatSession, connector: &MockConnector) -> ServerEnd {
    session.start();
    let mut server = connector.next_link().await.unwrap();
    assert_eq!(server.recv().await, Some(ClientEvent::Join("alice".into())));
    session
        .wait_for(ConnectionState::Connected, WAIT)
        .await
        .unwrap();
    server
}

#[tokio::test(start_paused = true)]
async fn join_is_the_first_event_on_a_new_link() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let mut events = session.subscribe();

    let _server = connected(&session, &connector).await;
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_before_connect_fails_fast() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let err = session.send_message(&"bob".into(), "hi").await.unwrap_err();
    assert!(matches!(err, ConnectxError::Offline));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn acks_resolve_sends_in_order() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let mut server = connected(&session, &connector).await;

    let first = session.send_message(&"bob".into(), "one").await.unwrap();
    let second = session.send_message(&"bob".into(), "two").await.unwrap();

    for expected in ["one", "two"] {
        match server.recv().await {
            Some(ClientEvent::PrivateMessage(req)) => {
                assert_eq!(req.message, expected);
                assert_eq!(req.token, "tok-alice-0001");
                assert_eq!(req.sender.as_str(), "alice");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    server
        .send(ServerEvent::MessageSent(enriched("alice", "bob", "one")))
        .await;
    server
        .send(ServerEvent::Error("invalid message: too long".into()))
        .await;

    let acked = first.confirm(WAIT).await.unwrap();
    assert_eq!(acked.body, "one");
    match second.confirm(WAIT).await {
        Err(ConnectxError::Rejected(msg)) => assert!(msg.contains("too long")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn acks_still_resolve_while_a_send_waits_on_a_full_link() {
    let connector = Arc::new(MockConnector::new());
    let session = Arc::new(session(&connector));
    let mut server = connected(&session, &connector).await;

    // Fill the link without the server reading anything.
    let first = session.send_message(&"bob".into(), "0").await.unwrap();
    let mut filled = 1;
    loop {
        let bob: UserId = "bob".into();
        let send = session.send_message(&bob, filled.to_string());
        match tokio::time::timeout(Duration::from_millis(10), send).await {
            Ok(pending) => {
                pending.unwrap();
                filled += 1;
            }
            Err(_) => break,
        }
    }
    let blocked = {
        let session = session.clone();
        tokio::spawn(async move { session.send_message(&"bob".into(), "overflow").await })
    };
    tokio::task::yield_now().await;
    assert!(!blocked.is_finished());

    server
        .send(ServerEvent::MessageSent(enriched("alice", "bob", "0")))
        .await;
    assert_eq!(first.confirm(WAIT).await.unwrap().body, "0");

    assert!(server.recv().await.is_some());
    blocked.await.unwrap().unwrap();
    for _ in 0..filled {
        assert!(server.recv().await.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn missing_ack_times_out() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let _server = connected(&session, &connector).await;

    let pending = session.send_message(&"bob".into(), "hello").await.unwrap();
    let err = pending.confirm(Duration::from_secs(10)).await.unwrap_err();
    assert!(matches!(err, ConnectxError::Timeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn reconnect_resends_join_and_fails_pending_sends() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let mut events = session.subscribe();
    let server = connected(&session, &connector).await;
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);

    let pending = session.send_message(&"bob".into(), "in flight").await.unwrap();
    server.close();

    assert!(matches!(
        pending.wait().await,
        Err(ConnectxError::Transport { .. })
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Disconnected { .. }
    ));

    let mut server = connector.next_link().await.unwrap();
    assert_eq!(server.recv().await, Some(ClientEvent::Join("alice".into())));
    session
        .wait_for(ConnectionState::Connected, WAIT)
        .await
        .unwrap();
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded_then_offline() {
    let connector = Arc::new(MockConnector::new());
    connector.refuse_all(true);
    let session = session(&connector);
    let mut events = session.subscribe();
    session.start();

    session
        .wait_for(ConnectionState::Offline, WAIT)
        .await
        .unwrap();
    assert_eq!(connector.attempts(), 3);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Offline);
    assert!(matches!(
        session.send_message(&"bob".into(), "hi").await,
        Err(ConnectxError::Offline)
    ));

    // Offline is sticky until a manual reconnect.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempts(), 3);

    connector.refuse_all(false);
    session.reconnect();
    let mut server = connector.next_link().await.unwrap();
    assert_eq!(server.recv().await, Some(ClientEvent::Join("alice".into())));
    session
        .wait_for(ConnectionState::Connected, WAIT)
        .await
        .unwrap();
    assert_eq!(connector.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_resets_after_each_success() {
    let connector = Arc::new(MockConnector::new());
    connector.refuse_next(2);
    let session = session(&connector);
    let mut events = session.subscribe();

    let server = connected(&session, &connector).await;
    assert_eq!(connector.attempts(), 3);

    connector.refuse_next(2);
    server.close();
    let mut server = connector.next_link().await.unwrap();
    assert_eq!(server.recv().await, Some(ClientEvent::Join("alice".into())));
    session
        .wait_for(ConnectionState::Connected, WAIT)
        .await
        .unwrap();
    assert_eq!(connector.attempts(), 6);
    // Never went offline along the way.
    while let Ok(event) = events.try_recv() {
        assert_ne!(event, SessionEvent::Offline);
    }
}

#[tokio::test(start_paused = true)]
async fn hung_connect_attempt_times_out_and_retries() {
    let connector = Arc::new(MockConnector::new());
    connector.hang_next(1);
    let session = session(&connector);

    let _server = connected(&session, &connector).await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_events_reach_subscribers() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let mut events = session.subscribe();
    let server = connected(&session, &connector).await;
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);

    let live = enriched("bob", "alice", "hey");
    server.send(ServerEvent::PrivateMessage(live.clone())).await;
    server
        .send(ServerEvent::Typing(TypingNotice {
            sender: "bob".into(),
        }))
        .await;

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Server(ServerEvent::PrivateMessage(live))
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Server(ServerEvent::Typing(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn typing_events_go_out_unacknowledged() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let mut server = connected(&session, &connector).await;

    session.send_typing(&"bob".into()).await.unwrap();
    session.send_stop_typing(&"bob".into()).await.unwrap();

    assert!(matches!(server.recv().await, Some(ClientEvent::Typing(_))));
    match server.recv().await {
        Some(ClientEvent::StopTyping(req)) => assert_eq!(req.receiver.as_str(), "bob"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_rejects_pending_and_disconnects() {
    let connector = Arc::new(MockConnector::new());
    let session = session(&connector);
    let _server = connected(&session, &connector).await;

    let pending = session.send_message(&"bob".into(), "bye").await.unwrap();
    session.shutdown().await;

    assert!(pending.wait().await.is_err());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(matches!(
        session.send_message(&"bob".into(), "after").await,
        Err(ConnectxError::Offline)
    ));
}
