//! Integration tests for a mounted notification session: push and poll
//! merging, optimistic reads, listeners, and lifecycle.

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use notisync_core::events::InboxEvent;
use notisync_core::types::{InboxId, NotificationId, UserType};
use notisync_realtime::ConnectionState;
use notisync_realtime::stomp::StompCommand;
use notisync_service::{MarkOutcome, PollOutcome};

use helpers::{TestApp, alice, record, settle};

#[tokio::test(start_paused = true)]
async fn test_mount_seeds_store_from_backend() {
    let app = TestApp::new();
    app.backend.set_records(vec![
        record(alice(), 1, false, 0),
        record(alice(), 2, false, 10),
        record(alice(), 3, true, 20),
        record(InboxId::new(21, UserType::Company), 4, false, 30),
    ]);

    let session = app.mount(alice()).await;

    let ids: Vec<i64> = session
        .store()
        .unread_list()
        .iter()
        .map(|r| r.id.get())
        .collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(session.store().unread_count(), 2);
    assert_eq!(session.connection_state(), ConnectionState::Connected);

    let peer = app.live_peer().await;
    assert_eq!(peer.target().auth_token.as_deref(), Some("test-token"));
    assert_eq!(
        peer.sent()[0].get("destination"),
        Some("/topic/notifications/individual/21")
    );
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_survives_stale_poll() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;

    let pushed = record(alice(), 1, false, 0);
    app.backend.insert(pushed.clone());
    app.push(&session, &pushed).await;
    assert_eq!(session.store().unread_count(), 1);

    app.backend.fail_acks(true);
    assert_eq!(session.mark_read(NotificationId(1)).await, MarkOutcome::Marked);
    assert_eq!(app.backend.is_read(1), Some(false));

    // the server still lists the record as unread
    assert!(matches!(session.refresh().await, PollOutcome::Applied(_)));
    assert_eq!(session.store().is_read(NotificationId(1)), Some(true));
    assert_eq!(session.store().unread_count(), 0);
    assert_eq!(app.backend.calls("mark_read"), 2);

    // once the backend recovers the next poll delivers the acknowledgement
    app.backend.fail_acks(false);
    session.refresh().await;
    assert_eq!(app.backend.is_read(1), Some(true));
    assert_eq!(session.store().unread_count(), 0);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_omission_marks_read() {
    let app = TestApp::new();
    app.backend.set_records(vec![record(alice(), 2, false, 0)]);
    let session = app.mount(alice()).await;
    assert_eq!(session.store().unread_count(), 1);

    // read elsewhere, e.g. in another browser tab
    app.backend.set_records(vec![record(alice(), 2, true, 0)]);
    let outcome = session.refresh().await;

    let PollOutcome::Applied(merge) = outcome else {
        panic!("expected applied poll, got {outcome:?}");
    };
    assert_eq!(merge.reconciled_read, vec![NotificationId(2)]);
    assert_eq!(session.store().unread_count(), 0);
    assert_eq!(session.store().is_read(NotificationId(2)), Some(true));
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_double_mark_read_is_idempotent() {
    let app = TestApp::new();
    app.backend.set_records(vec![
        record(alice(), 1, false, 0),
        record(alice(), 2, false, 1),
    ]);
    let session = app.mount(alice()).await;

    assert_eq!(session.mark_read(NotificationId(1)).await, MarkOutcome::Marked);
    assert_eq!(session.mark_read(NotificationId(1)).await, MarkOutcome::AlreadyRead);
    assert_eq!(session.store().unread_count(), 1);
    assert_eq!(app.backend.calls("mark_read"), 1);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_push_and_poll_of_same_id_do_not_duplicate() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;

    let pushed = record(alice(), 5, false, 0);
    app.backend.insert(pushed.clone());
    app.push(&session, &pushed).await;
    session.refresh().await;
    app.push(&session, &pushed).await;

    assert_eq!(session.store().unread_count(), 1);
    assert_eq!(session.store().unread_list().len(), 1);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_listeners_observe_identical_counts() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;

    let seen: Arc<Mutex<Vec<(char, usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    for tag in ['a', 'b'] {
        let seen = seen.clone();
        let store = session.store().clone();
        session.subscribe(move |snapshot| {
            seen.lock()
                .unwrap()
                .push((tag, snapshot.unread_count, store.unread_count()));
        });
    }

    app.push(&session, &record(alice(), 1, false, 0)).await;
    app.push(&session, &record(alice(), 2, false, 1)).await;
    session.mark_read(NotificationId(1)).await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 6);
    for pair in seen.chunks(2) {
        assert_eq!(pair[0].0, 'a');
        assert_eq!(pair[1].0, 'b');
        assert_eq!(pair[0].1, pair[1].1);
        assert_eq!(pair[0].2, pair[1].2);
        assert_eq!(pair[0].1, pair[0].2);
    }
    let counts: Vec<usize> = seen.iter().step_by(2).map(|s| s.1).collect();
    assert_eq!(counts, vec![1, 2, 1]);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_state_changed_event_broadcast() {
    let app = TestApp::new();
    let mut bus = app.events.subscribe();
    let session = app.mount(alice()).await;

    app.push(&session, &record(alice(), 1, false, 0)).await;

    let mut counts = Vec::new();
    while let Ok(event) = bus.try_recv() {
        if let InboxEvent::StateChanged { inbox, unread_count } = event {
            assert_eq!(inbox, alice());
            counts.push(unread_count);
        }
    }
    assert_eq!(counts.last(), Some(&1));
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped_and_pipeline_continues() {
    let app = TestApp::new();
    let session = app.mount(alice()).await;
    let peer = app.live_peer().await;
    let sub_id = session.subscriptions().active().unwrap().id;

    peer.message(&sub_id, "{\"id\": \"not-a-number\"");
    settle().await;
    app.push(&session, &record(alice(), 9, false, 0)).await;

    assert_eq!(session.store().unread_count(), 1);
    let metrics = session.metrics();
    assert_eq!(metrics.frames_dropped, 1);
    assert_eq!(metrics.pushes_ingested, 1);
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_keeps_last_known_state() {
    let app = TestApp::new();
    app.backend.set_records(vec![record(alice(), 1, false, 0)]);
    let session = app.mount(alice()).await;

    app.backend.fail_reads(true);
    app.backend.set_records(Vec::new());
    let outcome = session.refresh().await;

    assert!(matches!(outcome, PollOutcome::Failed(_)));
    assert_eq!(session.store().unread_count(), 1);
    assert_eq!(session.metrics().polls_failed, 1);
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_mark_all_read_sends_one_bulk_request() {
    let app = TestApp::new();
    app.backend.set_records(vec![
        record(alice(), 1, false, 0),
        record(alice(), 2, false, 1),
        record(alice(), 3, false, 2),
    ]);
    let session = app.mount(alice()).await;

    let marked = session.mark_all_read().await;

    assert_eq!(marked.len(), 3);
    assert_eq!(session.store().unread_count(), 0);
    assert_eq!(app.backend.calls("mark_all_read"), 1);
    assert_eq!(app.backend.calls("mark_read"), 0);
    assert_eq!(app.backend.is_read(2), Some(true));
    app.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_last_unmount_stops_timers_and_socket() {
    let app = TestApp::new();
    let first = app.mount(alice()).await;
    let _second = app.mount(alice()).await;
    let peer = app.live_peer().await;

    assert!(!app.manager.unmount(alice()).await);
    assert_eq!(first.connection_state(), ConnectionState::Connected);

    assert!(app.manager.unmount(alice()).await);
    assert!(first.is_torn_down());
    assert_eq!(first.connection_state(), ConnectionState::Disconnected);
    assert_eq!(peer.sent_commands().last(), Some(&StompCommand::Disconnect));

    let polls = app.backend.calls("unread");
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(app.backend.calls("unread"), polls);
    assert_eq!(app.transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_identity_switch_never_overlaps_subscriptions() {
    let app = TestApp::new();
    let acme = InboxId::new(77, UserType::Company);
    app.backend.set_records(vec![
        record(alice(), 1, false, 0),
        record(acme, 2, false, 0),
    ]);

    let first = app.mount(alice()).await;
    let old_peer = app.live_peer().await;
    let second = app.mount(acme).await;
    let new_peer = app.live_peer().await;

    assert!(first.is_torn_down());
    assert!(old_peer.is_closed_by_client());
    assert_eq!(
        old_peer.sent_commands(),
        vec![
            StompCommand::Subscribe,
            StompCommand::Unsubscribe,
            StompCommand::Disconnect
        ]
    );
    assert_eq!(
        new_peer.sent()[0].get("destination"),
        Some("/topic/notifications/company/77")
    );
    let ids: Vec<i64> = second
        .store()
        .unread_list()
        .iter()
        .map(|r| r.id.get())
        .collect();
    assert_eq!(ids, vec![2]);

    // a push addressed to the previous identity is ignored
    app.push(&second, &record(alice(), 3, false, 5)).await;
    assert_eq!(second.store().unread_count(), 1);
    app.manager.shutdown().await;
}
