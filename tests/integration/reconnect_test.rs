//! Integration tests for push channel loss, bounded reconnect, and the
//! fallback to polling.

mod helpers;

use std::time::Duration;

use notisync_realtime::stomp::{HeartBeat, StompCommand};
use notisync_realtime::{ConnectBehavior, ConnectionState};

use helpers::{TestApp, alice, push_body, record, settle, test_config};

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_are_bounded() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;
    let mut states = session.connection_changes();

    app.transport.set_fallback(ConnectBehavior::Refuse);
    app.live_peer().await.close();
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(session.connection_state(), ConnectionState::Failed);
    // one initial connection plus three refused retries
    assert_eq!(app.transport.attempts(), 4);
    assert_eq!(session.metrics().reconnects, 3);

    states.borrow_and_update();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(app.transport.attempts(), 4);
    assert!(!states.has_changed().unwrap());
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_channel_degrades_to_polling() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;

    app.transport.set_fallback(ConnectBehavior::Refuse);
    app.live_peer().await.fail("connection reset by peer");
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(session.connection_state(), ConnectionState::Failed);

    // new notifications still arrive through the periodic poll
    app.backend.insert(record(alice(), 11, false, 0));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(session.store().unread_count(), 1);
    assert!(session.metrics().polls_ok >= 2);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_after_failure() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;

    app.transport.set_fallback(ConnectBehavior::Refuse);
    app.live_peer().await.close();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(session.connection_state(), ConnectionState::Failed);

    app.backend.insert(record(alice(), 12, false, 0));
    app.transport.set_fallback(ConnectBehavior::Accept);
    session.reconnect();
    let peer = app.transport.peer(1).await;
    settle().await;

    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(peer.sent_commands(), vec![StompCommand::Subscribe]);
    // catch-up poll on the restored channel
    assert_eq!(session.store().unread_count(), 1);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_loss_recovers_and_resubscribes() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;
    let old_id = session.subscriptions().active().unwrap().id;

    app.transport
        .script([ConnectBehavior::Refuse, ConnectBehavior::Refuse]);
    app.live_peer().await.fail("connection reset by peer");
    app.backend.insert(record(alice(), 1, false, 0));
    let peer = app.transport.peer(1).await;
    settle().await;

    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(app.transport.attempts(), 4);
    assert_eq!(session.metrics().reconnects, 3);
    // the record created while offline was picked up by the catch-up poll
    assert_eq!(session.store().unread_count(), 1);

    let active = session.subscriptions().active().unwrap();
    assert_ne!(active.id, old_id);
    assert_eq!(peer.sent_commands(), vec![StompCommand::Subscribe]);

    // frames tagged with the dead subscription are ignored
    peer.message(&old_id, push_body(&record(alice(), 2, false, 1)));
    peer.message(&active.id, push_body(&record(alice(), 3, false, 2)));
    settle().await;
    assert_eq!(session.store().unread_count(), 2);
    assert_eq!(session.store().get(notisync_core::types::NotificationId(2)), None);

    // a later loss starts counting from one again
    app.transport.script([ConnectBehavior::Refuse, ConnectBehavior::Refuse]);
    peer.close();
    app.transport.peer(2).await;
    settle().await;
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_intentional_disconnect_suppresses_reconnect() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;
    let peer = app.live_peer().await;

    let (torn_down, ()) = tokio::join!(app.manager.unmount(alice()), async {
        peer.fail("socket closed");
        peer.close();
    });
    assert!(torn_down);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(app.transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unmount_during_backoff_cancels_retry() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;

    app.live_peer().await.close();
    settle().await;
    assert!(matches!(
        session.connection_state(),
        ConnectionState::Reconnecting { attempt: 1 }
    ));

    app.manager.unmount(alice()).await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(app.transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_is_detected_by_heartbeat() {
    let mut config = test_config();
    config.realtime.heartbeat_outgoing_ms = 1_000;
    config.realtime.heartbeat_incoming_ms = 1_000;
    let app = TestApp::with_config(config);
    let transport = app
        .transport
        .clone()
        .with_server_heartbeat(HeartBeat::new(1_000, 1_000));

    let session = app.mount(alice()).await;
    let first = transport.peer(0).await;

    // the server stays silent; the client declares the connection dead
    let second = transport.peer(1).await;
    settle().await;

    assert!(first.heartbeats_received() >= 1);
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(second.sent_commands(), vec![StompCommand::Subscribe]);
    app.manager.shutdown().await;
}
