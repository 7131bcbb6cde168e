//! End-to-end connection lifecycle integration tests.
//!
//! Drives the SocketManager through a scripted connector: handshake and
//! token flow, subscription replay after reconnect, the linear retry
//! schedule, attempt exhaustion, and race-free disconnect.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulse_core::error::PulseError;
use pulse_socket::{ChannelType, ConnectionState, EventKind, SocketManager};

use common::{settle, MockConnector};

fn manager_with(connector: &Arc<MockConnector>) -> SocketManager {
    SocketManager::new("ws://test.invalid/ws", Arc::clone(connector) as _)
}

// ---- Handshake ----

#[tokio::test(start_paused = true)]
async fn connect_sends_token_and_records_auth_success() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(Some("T1".into())).await.unwrap();
    settle().await;

    assert!(manager.is_connected());
    assert_eq!(manager.reconnect_attempts().await, 0);

    let transport = connector.last_transport();
    let frames = transport.sent_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].to_json()["data"]["token"], "T1");

    assert!(!manager.is_authenticated().await);
    transport.emit_frame("auth_success", serde_json::json!({"user_id": "7"}));
    settle().await;
    assert!(manager.is_authenticated().await);
}

#[tokio::test(start_paused = true)]
async fn auth_error_leaves_connection_open() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(Some("bad-token".into())).await.unwrap();
    settle().await;

    let transport = connector.last_transport();
    transport.emit_frame("auth_error", serde_json::json!({"message": "expired"}));
    settle().await;

    // Permissive policy: unauthenticated but still connected.
    assert!(manager.is_connected());
    assert!(!manager.is_authenticated().await);
    assert!(!transport.is_closed());
}

#[tokio::test(start_paused = true)]
async fn connect_without_token_skips_handshake() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;

    assert!(manager.is_connected());
    assert_eq!(connector.last_transport().sent_count("authenticate"), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_while_active() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;
    manager.connect(None).await.unwrap();
    settle().await;

    assert_eq!(connector.dial_count(), 1);
}

// ---- Subscriptions ----

#[tokio::test(start_paused = true)]
async fn subscribe_while_disconnected_is_sent_on_connect() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.subscribe(ChannelType::Keyword, "42").await;
    assert_eq!(manager.subscriptions().await.len(), 1);

    manager.connect(None).await.unwrap();
    settle().await;

    let transport = connector.last_transport();
    assert_eq!(transport.sent_count("subscribe"), 1);
    let frame = &transport.sent_frames()[0];
    assert_eq!(frame.to_json()["data"]["type"], "keyword");
    assert_eq!(frame.to_json()["data"]["target"], "42");
}

#[tokio::test(start_paused = true)]
async fn replay_waits_for_auth_acknowledgment() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.subscribe(ChannelType::Keyword, "rust").await;
    manager.connect(Some("T1".into())).await.unwrap();
    settle().await;

    let transport = connector.last_transport();
    assert_eq!(transport.sent_count("authenticate"), 1);
    assert_eq!(transport.sent_count("subscribe"), 0);

    transport.emit_frame("auth_success", serde_json::json!({}));
    settle().await;
    assert_eq!(transport.sent_count("subscribe"), 1);
}

#[tokio::test(start_paused = true)]
async fn replay_also_runs_after_auth_failure() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.subscribe(ChannelType::Global, "all").await;
    manager.connect(Some("T1".into())).await.unwrap();
    settle().await;

    let transport = connector.last_transport();
    transport.emit_frame("auth_error", serde_json::json!({}));
    settle().await;

    // Unauthenticated state never blocks subscription sends.
    assert_eq!(transport.sent_count("subscribe"), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_subscribe_sends_one_frame() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;

    manager.subscribe(ChannelType::Keyword, "rust").await;
    manager.subscribe(ChannelType::Keyword, "rust").await;

    assert_eq!(connector.last_transport().sent_count("subscribe"), 1);
    assert_eq!(manager.subscriptions().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_sends_once_and_is_idempotent() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;

    manager.subscribe(ChannelType::Keyword, "rust").await;
    manager.unsubscribe(ChannelType::Keyword, "rust").await;
    manager.unsubscribe(ChannelType::Keyword, "rust").await;

    let transport = connector.last_transport();
    assert_eq!(transport.sent_count("unsubscribe"), 1);
    assert!(manager.subscriptions().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn registry_replayed_exactly_once_per_reconnect() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.subscribe(ChannelType::Keyword, "rust").await;
    manager.subscribe(ChannelType::User, "7").await;

    manager.connect(None).await.unwrap();
    settle().await;
    assert_eq!(connector.transport(0).sent_count("subscribe"), 2);

    connector.transport(0).drop_connection("server restart");
    settle().await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    // New transport, full registry replayed once, nothing dropped.
    assert_eq!(connector.dial_count(), 2);
    let second = connector.transport(1);
    assert_eq!(second.sent_count("subscribe"), 2);
    assert!(manager.is_connected());
}

// ---- Reconnection schedule ----

#[tokio::test(start_paused = true)]
async fn retry_delays_grow_linearly() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;

    connector.transport(0).drop_connection("drop 1");
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(connector.dial_count(), 2);

    connector.transport(1).drop_connection("drop 2");
    settle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(connector.dial_count(), 3);

    let times = connector.dial_times();
    let first_gap = times[1].duration_since(times[0]);
    let second_gap = times[2].duration_since(times[1]);

    // Attempt 1 waits 5000 ms, attempt 2 waits 10000 ms.
    assert!(first_gap >= Duration::from_secs(5) && first_gap < Duration::from_secs(6));
    assert!(second_gap >= Duration::from_secs(10) && second_gap < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_max_attempts() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);
    connector.fail_all(true);

    manager.connect(None).await.unwrap();
    // Sum of all 10 delays is 275s; go well past it.
    tokio::time::sleep(Duration::from_secs(400)).await;
    settle().await;

    // Initial dial plus 10 retries, then terminal failure.
    assert_eq!(connector.dial_count(), 11);
    assert_eq!(manager.state(), ConnectionState::Failed);

    // No further attempts, ever.
    tokio::time::sleep(Duration::from_secs(400)).await;
    settle().await;
    assert_eq!(connector.dial_count(), 11);
}

#[tokio::test(start_paused = true)]
async fn failed_state_recovers_via_disconnect_connect() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);
    connector.fail_all(true);

    manager.connect(None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(400)).await;
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Failed);
    let dials_at_failure = connector.dial_count();

    // connect() alone stays failed; the explicit cycle resets the counter.
    manager.connect(None).await.unwrap();
    settle().await;
    assert_eq!(connector.dial_count(), dials_at_failure);

    connector.fail_all(false);
    manager.disconnect().await;
    manager.connect(None).await.unwrap();
    settle().await;

    assert!(manager.is_connected());
    assert_eq!(manager.reconnect_attempts().await, 0);
}

#[tokio::test(start_paused = true)]
async fn dial_failure_enters_retry_path() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);
    connector.fail_next(1);

    manager.connect(None).await.unwrap();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;
    assert!(manager.is_connected());
    assert_eq!(connector.dial_count(), 2);
}

// ---- Disconnect races ----

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;
    connector.transport(0).drop_connection("network flap");
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    // The scheduled timer must not open a new transport.
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(connector.dial_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(connector.transport(0).is_closed());
}

#[tokio::test(start_paused = true)]
async fn no_events_dispatched_after_disconnect() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    manager.on(EventKind::Message, move |_| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
    });

    manager.connect(None).await.unwrap();
    settle().await;
    let transport = connector.transport(0);

    transport.emit_frame("message", serde_json::json!({"id": "n-1"}));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    manager.disconnect().await;
    transport.emit_frame("message", serde_json::json!({"id": "n-2"}));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    manager.connect(None).await.unwrap();
    settle().await;
    manager.disconnect().await;
    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

// ---- Listeners across transports ----

#[tokio::test(start_paused = true)]
async fn listeners_survive_reconnect_without_rebinding() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    manager.on(EventKind::Message, move |_| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
    });

    manager.connect(None).await.unwrap();
    settle().await;
    connector.transport(0).emit_frame("message", serde_json::json!({"id": "a"}));
    settle().await;

    connector.transport(0).drop_connection("flap");
    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    connector.transport(1).emit_frame("message", serde_json::json!({"id": "b"}));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn removed_listener_stops_receiving() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    let id = manager.on(EventKind::Message, move |_| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
    });

    manager.connect(None).await.unwrap();
    settle().await;

    assert!(manager.off(&EventKind::Message, id));
    connector.transport(0).emit_frame("message", serde_json::json!({}));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

// ---- Liveness and rooms ----

#[tokio::test(start_paused = true)]
async fn ping_is_noop_while_disconnected() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    // Must not queue: nothing sent after a later connect.
    manager.ping().await;
    manager.connect(None).await.unwrap();
    settle().await;
    assert_eq!(connector.transport(0).sent_count("ping"), 0);

    manager.ping().await;
    assert_eq!(connector.transport(0).sent_count("ping"), 1);
}

#[tokio::test(start_paused = true)]
async fn get_rooms_resolves_empty_when_disconnected() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    let rooms = manager.get_rooms().await.unwrap();
    assert!(rooms.is_empty());
    assert_eq!(connector.dial_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn get_rooms_resolves_from_server_answer() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_rooms().await }
    });
    settle().await;

    let transport = connector.transport(0);
    assert_eq!(transport.sent_count("get_rooms"), 1);
    transport.emit_frame(
        "rooms",
        serde_json::json!({"rooms": ["keyword:rust", "global:all"]}),
    );

    let rooms = pending.await.unwrap().unwrap();
    assert_eq!(rooms, vec!["keyword:rust".to_string(), "global:all".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn get_rooms_times_out_without_answer() {
    let connector = MockConnector::new();
    let manager = manager_with(&connector);

    manager.connect(None).await.unwrap();
    settle().await;

    let result = manager.get_rooms().await;
    assert!(matches!(result, Err(PulseError::Timeout(_))));
}
