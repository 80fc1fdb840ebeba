#![allow(clippy::unwrap_used)]
// Connection lifecycle against a scripted transport, on a paused clock.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use ripley_api::SocketSignal;
use ripley_core::{ConnectionState, DashboardClient, Subscription, TracingNotifier};

use common::{FakeSource, FakeTransport, settle, test_config};

fn client() -> (DashboardClient, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::default());
    let client = DashboardClient::from_parts(
        test_config(),
        transport.clone(),
        Arc::new(FakeSource::default()),
        Arc::new(TracingNotifier),
    )
    .unwrap();
    (client, transport)
}

fn record(client: &DashboardClient, event_type: &str) -> (Subscription, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = client.on(event_type, move |data| sink.lock().unwrap().push(data.clone()));
    (sub, seen)
}

async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

fn abnormal() -> SocketSignal {
    SocketSignal::Closed {
        code: 1006,
        was_clean: false,
    }
}

// ── Opening ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn socket_url_is_derived_from_the_page() {
    let (client, transport) = client();
    client.connect();

    assert_eq!(
        transport.last_url().unwrap().as_str(),
        "ws://ripper.local:3000/api/ws"
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_connect_opens_one_socket() {
    let (client, transport) = client();
    client.connect();
    client.connect();
    assert_eq!(transport.opened(), 1);
    assert_eq!(client.connection().current_state(), ConnectionState::Connecting);

    transport.send(0, SocketSignal::Open);
    settle().await;
    client.connect();

    assert_eq!(transport.opened(), 1);
    assert_eq!(client.connection().current_state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn open_publishes_connected_status() {
    let (client, transport) = client();
    let (_sub, seen) = record(&client, "connection");
    let status = client.connection_status();

    client.connect();
    transport.send(0, SocketSignal::Open);
    settle().await;

    assert!(*status.borrow());
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "connected": true })]);
}

#[tokio::test(start_paused = true)]
async fn listener_may_disconnect_from_the_connected_event() {
    let (client, transport) = client();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let connection = client.connection().clone();
    let _sub = client.on("connection", move |data| {
        sink.lock().unwrap().push(data.clone());
        if data["connected"] == json!(true) {
            connection.disconnect();
        }
    });

    client.connect();
    transport.send(0, SocketSignal::Open);
    settle().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![json!({ "connected": true }), json!({ "connected": false })]
    );
    assert!(!client.connection().is_connected());
    assert_eq!(client.connection().current_state(), ConnectionState::Closing);
    assert_eq!(transport.close_code(0), Some(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_open_and_disconnect_never_leaves_status_connected() {
    for _ in 0..50 {
        let (client, transport) = client();
        let (_sub, seen) = record(&client, "connection");
        let status = client.connection_status();

        client.connect();
        transport.send(0, SocketSignal::Open);
        client.disconnect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!*status.borrow());
        let last = seen.lock().unwrap().last().cloned();
        assert!(
            last.is_none() || last == Some(json!({ "connected": false })),
            "last published status was {last:?}"
        );
    }
}

// ── Frames ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn frames_reach_subscribers_in_order() {
    let (client, transport) = client();
    let (_sub, seen) = record(&client, "Log");
    let mut all = client.events();

    client.connect();
    transport.send(0, SocketSignal::Open);
    transport.send_text(0, &json!({ "type": "Log", "data": { "level": "info", "message": "one" } }));
    transport.send(0, SocketSignal::Text("{not json".into()));
    transport.send_text(0, &json!({ "type": "Log", "data": { "level": "info", "message": "two" } }));
    settle().await;

    let messages: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|v| v["message"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(messages, vec!["one", "two"]);

    // The multiplexed stream also carries the synthetic connection event.
    assert_eq!(all.recv().await.unwrap().event_type, "connection");
    assert_eq!(all.recv().await.unwrap().event_type, "Log");
}

#[tokio::test(start_paused = true)]
async fn frames_before_open_are_ignored() {
    let (client, transport) = client();
    let (_sub, seen) = record(&client, "Log");

    client.connect();
    transport.send_text(0, &json!({ "type": "Log", "data": { "level": "info", "message": "early" } }));
    settle().await;

    assert!(seen.lock().unwrap().is_empty());
}

// ── Closing and reconnecting ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn close_before_open_stays_disconnected_and_backs_off() {
    let (client, transport) = client();
    let (_sub, seen) = record(&client, "connection");

    client.connect();
    transport.send(0, abnormal());
    settle().await;

    assert!(!client.connection().is_connected());
    assert!(seen.lock().unwrap().is_empty(), "no status change was published");
    assert_eq!(client.connection().reconnect_attempt(), 1);

    advance(999).await;
    assert_eq!(transport.opened(), 1);
    advance(1).await;
    assert_eq!(transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_until_the_cap_then_stops() {
    let (client, transport) = client();
    client.connect();

    for attempt in 1..=5_u32 {
        let socket = transport.opened() - 1;
        transport.send(socket, abnormal());
        settle().await;

        let delay = 1000 * 2_u64.pow(attempt - 1);
        advance(delay - 1).await;
        assert_eq!(transport.opened(), socket + 1, "attempt {attempt} fired early");
        advance(1).await;
        assert_eq!(transport.opened(), socket + 2, "attempt {attempt} did not fire");
    }

    // Sixth failure exceeds the cap.
    transport.send(5, abnormal());
    settle().await;
    advance(120_000).await;
    assert_eq!(transport.opened(), 6);
    assert_eq!(client.connection().current_state(), ConnectionState::Closed);

    // A manual connect starts over with a fresh budget.
    client.connect();
    assert_eq!(transport.opened(), 7);
    transport.send(6, abnormal());
    settle().await;
    assert_eq!(client.connection().reconnect_attempt(), 1);

    advance(999).await;
    assert_eq!(transport.opened(), 7);
    advance(1).await;
    assert_eq!(transport.opened(), 8);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_attempt_counter() {
    let (client, transport) = client();
    client.connect();
    transport.send(0, abnormal());
    settle().await;
    advance(1000).await;
    transport.send(1, abnormal());
    settle().await;
    assert_eq!(client.connection().reconnect_attempt(), 2);

    advance(2000).await;
    transport.send(2, SocketSignal::Open);
    settle().await;
    assert_eq!(client.connection().reconnect_attempt(), 0);

    // Next drop waits the base delay again.
    transport.send(2, abnormal());
    settle().await;
    advance(1000).await;
    assert_eq!(transport.opened(), 4);
}

#[tokio::test(start_paused = true)]
async fn vanished_socket_after_open_reports_disconnected() {
    let (client, transport) = client();
    let (_sub, seen) = record(&client, "connection");

    client.connect();
    transport.send(0, SocketSignal::Open);
    settle().await;
    transport.vanish(0);
    settle().await;

    assert!(!client.connection().is_connected());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![json!({ "connected": true }), json!({ "connected": false })]
    );
    advance(1000).await;
    assert_eq!(transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_normally_and_suppresses_reconnect() {
    let (client, transport) = client();
    client.connect();
    transport.send(0, SocketSignal::Open);
    settle().await;

    client.disconnect();
    assert_eq!(transport.close_code(0), Some(1000));
    assert!(!client.connection().is_connected());
    assert_eq!(client.connection().current_state(), ConnectionState::Closing);

    transport.send(
        0,
        SocketSignal::Closed {
            code: 1000,
            was_clean: true,
        },
    );
    settle().await;
    advance(60_000).await;

    assert_eq!(transport.opened(), 1);
    assert_eq!(client.connection().current_state(), ConnectionState::Closed);

    // Idempotent.
    client.disconnect();
    assert_eq!(client.connection().current_state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_backoff_cancels_the_timer() {
    let (client, transport) = client();
    client.connect();
    transport.send(0, abnormal());
    settle().await;

    client.disconnect();
    advance(60_000).await;

    assert_eq!(transport.opened(), 1);
    assert_eq!(client.connection().current_state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_disconnect_uses_the_base_delay() {
    let (client, transport) = client();
    client.connect();
    transport.send(0, abnormal());
    settle().await;
    advance(1000).await;
    transport.send(1, abnormal());
    settle().await;
    assert_eq!(client.connection().reconnect_attempt(), 2);

    client.disconnect();
    client.connect();
    assert_eq!(transport.opened(), 3);
    transport.send(2, abnormal());
    settle().await;
    assert_eq!(client.connection().reconnect_attempt(), 1);

    advance(1000).await;
    assert_eq!(transport.opened(), 4);
}

#[tokio::test(start_paused = true)]
async fn state_stream_tracks_lifecycle() {
    let (client, transport) = client();
    let state = client.connection_state();
    assert_eq!(*state.borrow(), ConnectionState::Idle);

    client.connect();
    assert_eq!(*state.borrow(), ConnectionState::Connecting);
    transport.send(0, SocketSignal::Open);
    settle().await;
    assert_eq!(*state.borrow(), ConnectionState::Open);
}
