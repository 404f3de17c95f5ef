#![allow(clippy::unwrap_used)]
// End-to-end tests for `HubClient` against a scripted hub on a loopback
// socket.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use hassly_core::{
    Backoff, ClientConfig, ConnectionState, CoreError, HubClient, HubSignal, ReconnectConfig,
    RequestOptions, ServiceCall,
};

const TOKEN: &str = "long-lived-token";
const HUB_VERSION: &str = "2026.10.1";

// ── Scripted hub ────────────────────────────────────────────────────

#[derive(Default)]
struct HubState {
    /// Result payload per command type.
    fixtures: Mutex<HashMap<String, Value>>,
    /// Full reply frame (minus id) per command type.
    raw: Mutex<HashMap<String, Value>>,
    silent: Mutex<HashSet<String>>,
    answer_pings: AtomicBool,
    /// Swallow the client's close frame and keep the socket open.
    ignore_close: AtomicBool,
    /// Sessions left that close right after `auth_ok`.
    close_after_auth: AtomicUsize,
    connections: AtomicUsize,
    received: Mutex<Vec<Value>>,
    /// Frames pushed to the current session; `None` drops it.
    push: Mutex<Option<mpsc::UnboundedSender<Option<String>>>>,
}

impl HubState {
    fn reply(&self, request: &Value) -> Option<Value> {
        let id = request["id"].as_u64()?;
        let command = request["type"].as_str()?;
        if self.silent.lock().unwrap().contains(command) {
            return None;
        }
        if command == "ping" {
            return self
                .answer_pings
                .load(Ordering::SeqCst)
                .then(|| json!({ "id": id, "type": "pong" }));
        }
        if let Some(frame) = self.raw.lock().unwrap().get(command) {
            let mut frame = frame.clone();
            frame["id"] = json!(id);
            return Some(frame);
        }

        let result = match command {
            "subscribe_events" | "unsubscribe_events" => Value::Null,
            "call_service" => json!({ "context": { "id": "ctx-1" }, "response": null }),
            _ => match self.fixtures.lock().unwrap().get(command) {
                Some(result) => result.clone(),
                None => {
                    return Some(json!({
                        "id": id,
                        "type": "result",
                        "success": false,
                        "error": { "code": "unknown_command", "message": "Unknown command." }
                    }));
                }
            },
        };
        Some(json!({ "id": id, "type": "result", "success": true, "result": result }))
    }
}

struct FakeHub {
    state: Arc<HubState>,
    url: String,
}

impl FakeHub {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/api/websocket", listener.local_addr().unwrap());

        let state = Arc::new(HubState::default());
        state.answer_pings.store(true, Ordering::SeqCst);
        for (command, result) in default_fixtures() {
            state.fixtures.lock().unwrap().insert(command.to_owned(), result);
        }

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(Arc::clone(&accept_state), stream));
            }
        });

        Self { state, url }
    }

    fn set(&self, command: &str, result: Value) {
        self.state
            .fixtures
            .lock()
            .unwrap()
            .insert(command.to_owned(), result);
    }

    fn reply_raw(&self, command: &str, frame: Value) {
        self.state.raw.lock().unwrap().insert(command.to_owned(), frame);
    }

    fn stay_silent(&self, command: &str) {
        self.state.silent.lock().unwrap().insert(command.to_owned());
    }

    fn speak(&self, command: &str) {
        self.state.silent.lock().unwrap().remove(command);
    }

    fn ignore_close(&self) {
        self.state.ignore_close.store(true, Ordering::SeqCst);
    }

    fn close_after_auth(&self, sessions: usize) {
        self.state.close_after_auth.store(sessions, Ordering::SeqCst);
    }

    fn answer_pings(&self, answer: bool) {
        self.state.answer_pings.store(answer, Ordering::SeqCst);
    }

    fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    fn received(&self, command: &str) -> Vec<Value> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["type"] == command)
            .cloned()
            .collect()
    }

    fn push(&self, frame: Value) {
        if let Some(tx) = self.state.push.lock().unwrap().as_ref() {
            tx.send(Some(frame.to_string())).unwrap();
        }
    }

    fn drop_connection(&self) {
        if let Some(tx) = self.state.push.lock().unwrap().as_ref() {
            let _ = tx.send(None);
        }
    }
}

async fn serve(state: Arc<HubState>, stream: TcpStream) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut stream) = ws.split();

    sink.send(Message::text(
        json!({ "type": "auth_required", "ha_version": HUB_VERSION }).to_string(),
    ))
    .await
    .unwrap();
    let Some(Ok(Message::Text(auth))) = stream.next().await else {
        return;
    };
    let auth: Value = serde_json::from_str(auth.as_str()).unwrap();
    if auth["access_token"] != TOKEN {
        let _ = sink
            .send(Message::text(
                json!({ "type": "auth_invalid", "message": "Invalid access token" }).to_string(),
            ))
            .await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    *state.push.lock().unwrap() = Some(tx);
    state.connections.fetch_add(1, Ordering::SeqCst);
    sink.send(Message::text(
        json!({ "type": "auth_ok", "ha_version": HUB_VERSION }).to_string(),
    ))
    .await
    .unwrap();

    let flaky = state
        .close_after_auth
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if flaky {
        let _ = sink.close().await;
        return;
    }

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    state.received.lock().unwrap().push(request.clone());
                    if let Some(reply) = state.reply(&request) {
                        if sink.send(Message::text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) if state.ignore_close.load(Ordering::SeqCst) => {
                    // Never read again, so the close reply is never flushed.
                    std::future::pending::<()>().await;
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            pushed = rx.recv() => match pushed {
                Some(Some(text)) => {
                    if sink.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Some(None) | None => break,
            },
        }
    }
}

fn default_fixtures() -> Vec<(&'static str, Value)> {
    vec![
        (
            "config/device_registry/list",
            json!([
                { "id": "d1", "name": "Lamp", "area_id": "kitchen" },
                { "id": "d2", "name": "Lamp", "area_id": "bedroom" }
            ]),
        ),
        (
            "config/entity_registry/list",
            json!([
                { "entity_id": "light.kitchen", "device_id": "d1", "platform": "hue" },
                { "entity_id": "light.bedroom", "device_id": "d2", "platform": "hue" }
            ]),
        ),
        (
            "config/area_registry/list",
            json!([
                { "area_id": "kitchen", "name": "Kitchen" },
                { "area_id": "bedroom", "name": "Bedroom" }
            ]),
        ),
        (
            "config/label_registry/list",
            json!([{ "label_id": "night", "name": "Night" }]),
        ),
        (
            "get_states",
            json!([
                { "entity_id": "light.kitchen", "state": "on", "attributes": { "friendly_name": "Kitchen" } },
                { "entity_id": "light.bedroom", "state": "off", "attributes": {} },
                { "entity_id": "sensor.orphan", "state": "21.5", "attributes": {} }
            ]),
        ),
        (
            "get_config",
            json!({
                "location_name": "Home",
                "version": HUB_VERSION,
                "time_zone": "Europe/Amsterdam",
                "components": ["light", "sensor"]
            }),
        ),
        (
            "get_services",
            json!({ "light": { "turn_on": {}, "turn_off": {} } }),
        ),
    ]
}

// ── Helpers ─────────────────────────────────────────────────────────

fn config(url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(url, SecretString::from(TOKEN.to_string()));
    config.response_timeout = Duration::from_secs(2);
    config.reconnect = ReconnectConfig::disabled();
    config
}

fn retrying(max_retries: u32) -> ReconnectConfig {
    ReconnectConfig {
        delay: Duration::from_millis(50),
        max_retries,
        backoff: Backoff::Fixed,
        max_delay: Duration::from_secs(1),
    }
}

async fn wait_for(rx: &mut broadcast::Receiver<HubSignal>, name: &str) -> HubSignal {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(signal) if signal.name() == name => return signal,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => panic!("signal bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}

fn drain(rx: &mut broadcast::Receiver<HubSignal>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        names.push(signal.name());
    }
    names
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

async fn wait_for_state(client: &HubClient, state: ConnectionState) {
    let mut rx = client.connection_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .unwrap();
}

async fn ready_client(config: ClientConfig) -> (HubClient, broadcast::Receiver<HubSignal>) {
    let client = HubClient::new(config);
    let mut signals = client.signals();
    client.connect().await.unwrap();
    wait_for(&mut signals, "subscribed").await;
    (client, signals)
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_bootstraps_cache_and_reaches_ready() {
    let hub = FakeHub::start().await;
    let client = HubClient::new(config(&hub.url));
    let mut signals = client.signals();

    let version = client.connect().await.unwrap();
    assert_eq!(version.as_deref(), Some(HUB_VERSION));
    assert_eq!(client.hub_version().as_deref(), Some(HUB_VERSION));
    wait_for(&mut signals, "subscribed").await;
    assert_eq!(client.state(), ConnectionState::Ready);

    let store = client.store();
    assert_eq!(store.device_count(), 2);
    assert_eq!(store.entity_count(), 2);
    assert_eq!(store.area_count(), 2);
    assert_eq!(store.label_count(), 1);
    // sensor.orphan has no registry entry.
    assert_eq!(store.state_count(), 2);
    assert!(store.state("sensor.orphan").is_none());
    assert_eq!(store.state("light.kitchen").unwrap().friendly_name(), "Kitchen");
    assert_eq!(store.config().unwrap().location_name.as_deref(), Some("Home"));
    assert!(store.services().unwrap().contains_key("light"));

    // Both devices are named "Lamp"; neither shadows the other.
    assert_eq!(store.device("d1").unwrap().area_id.as_deref(), Some("kitchen"));
    assert_eq!(store.device("d2").unwrap().area_id.as_deref(), Some("bedroom"));

    let subscribe = hub.received("subscribe_events");
    assert_eq!(subscribe.len(), 1);
    assert_eq!(subscribe[0]["id"], 8);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let hub = FakeHub::start().await;
    let (client, _signals) = ready_client(config(&hub.url)).await;

    assert!(matches!(client.connect().await, Err(CoreError::AlreadyConnected)));
    assert_eq!(hub.connections(), 1);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_fails_handshake() {
    let hub = FakeHub::start().await;
    let mut config = config(&hub.url);
    config.token = SecretString::from("wrong".to_string());
    let client = HubClient::new(config);
    let mut signals = client.signals();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::HandshakeFailed { .. }), "got {err:?}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(wait_for(&mut signals, "error").await.name(), "error");
}

#[tokio::test]
async fn test_invalid_address_fails_before_dialing() {
    let client = HubClient::new(config("http://homeassistant.local:8123"));
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidAddress { .. }), "got {err:?}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let hub = FakeHub::start().await;
    let (client, mut signals) = ready_client(config(&hub.url)).await;
    drain(&mut signals);

    client.close().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    client.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let names = drain(&mut signals);
    assert_eq!(names.iter().filter(|n| **n == "disconnected").count(), 1, "{names:?}");
    assert!(!client.is_connected());
    assert_eq!(hub.connections(), 1);
}

#[tokio::test]
async fn test_close_without_connecting_is_a_noop() {
    let client = HubClient::new(config("ws://127.0.0.1:9/api/websocket"));
    let mut signals = client.signals();
    client.close().await.unwrap();
    assert!(drain(&mut signals).is_empty());
}

#[tokio::test]
async fn test_unacknowledged_close_times_out_but_disconnects() {
    let hub = FakeHub::start().await;
    hub.ignore_close();
    let mut config = config(&hub.url);
    config.response_timeout = Duration::from_millis(500);
    let (client, mut signals) = ready_client(config).await;
    drain(&mut signals);

    let err = client.close().await.unwrap_err();
    assert!(err.is_timeout(), "got {err:?}");
    assert_eq!(err.to_string(), "Close timed out after 500ms");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());
    assert!(drain(&mut signals).contains(&"disconnected"));

    // A second close has nothing left to wait for.
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_ca_file_fails_secure_connect() {
    let mut config = config("wss://127.0.0.1:9/api/websocket");
    config.ca_cert = Some("/nonexistent/hassly-ca.pem".into());
    let client = HubClient::new(config);
    let mut signals = client.signals();

    let err = client.connect().await.unwrap_err();
    match &err {
        CoreError::CertificateRead { path, .. } => {
            assert_eq!(path.to_str(), Some("/nonexistent/hassly-ca.pem"));
        }
        other => panic!("expected a certificate error, got {other:?}"),
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(wait_for(&mut signals, "error").await.name(), "error");
}

// ── Requests ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_while_disconnected() {
    let client = HubClient::new(config("ws://127.0.0.1:9/api/websocket"));
    let err = client.fetch("get_states", None).await.unwrap_err();

    assert!(err.is_not_connected());
    assert_eq!(err.to_string(), "Fetch error: not connected to Home Assistant");
}

#[tokio::test]
async fn test_fetch_returns_result_payload() {
    let hub = FakeHub::start().await;
    hub.set("search/related", json!({ "entity": ["light.kitchen"] }));
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let result = client
        .fetch(
            "search/related",
            Some(json!({ "item_type": "device", "item_id": "d1" })),
        )
        .await
        .unwrap();
    assert_eq!(result, json!({ "entity": ["light.kitchen"] }));

    let sent = hub.received("search/related");
    assert_eq!(sent[0]["item_id"], "d1");
    assert!(sent[0]["id"].as_u64().unwrap() >= 100);
    assert_eq!(client.pending_requests(), 0);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_failure_without_error_body_is_unknown_error() {
    let hub = FakeHub::start().await;
    hub.reply_raw("broken/command", json!({ "type": "result", "success": false }));
    let (client, mut signals) = ready_client(config(&hub.url)).await;

    let err = client.fetch("broken/command", None).await.unwrap_err();
    match err {
        CoreError::Remote { code, message } => {
            assert_eq!(code, None);
            assert_eq!(message, "Unknown error");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(wait_for(&mut signals, "error").await.name(), "error");
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_remote_error_keeps_code_and_message() {
    let hub = FakeHub::start().await;
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let err = client.fetch("no/such/command", None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Home Assistant returned an error (unknown_command): Unknown command."
    );
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_fetch_times_out_and_forgets_the_request() {
    let hub = FakeHub::start().await;
    hub.stay_silent("slow/command");
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let err = client
        .fetch_with(
            "slow/command",
            None,
            RequestOptions::default().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "got {err:?}");
    assert_eq!(client.pending_requests(), 0);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_explicit_request_id_is_used() {
    let hub = FakeHub::start().await;
    hub.set("custom/thing", json!(true));
    let (client, _signals) = ready_client(config(&hub.url)).await;

    client
        .fetch_with("custom/thing", None, RequestOptions::default().id(4242))
        .await
        .unwrap();
    assert_eq!(hub.received("custom/thing")[0]["id"], 4242);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_reserved_id_is_refused_without_disturbing_refresh() {
    let hub = FakeHub::start().await;
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let err = client
        .fetch_with("custom/thing", None, RequestOptions::default().id(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ReservedRequestId { id: 5 }), "got {err:?}");
    assert!(hub.received("custom/thing").is_empty());

    // The states slot is still free for the cache refresh.
    assert_eq!(client.refresh_states().await.unwrap(), 2);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_call_service_sends_target_and_returns_context() {
    let hub = FakeHub::start().await;
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let response = client
        .call_service(
            ServiceCall::new("light", "turn_on")
                .entity("light.kitchen")
                .data(json!({ "brightness": 120 })),
            RequestOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.context, Some(json!({ "id": "ctx-1" })));

    let sent = &hub.received("call_service")[0];
    assert_eq!(sent["domain"], "light");
    assert_eq!(sent["target"], json!({ "entity_id": "light.kitchen" }));
    assert_eq!(sent["service_data"], json!({ "brightness": 120 }));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe() {
    let hub = FakeHub::start().await;
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let id = client.subscribe(Some("automation_triggered")).await.unwrap();
    assert_eq!(client.subscriptions(), vec![id]);

    client.unsubscribe(id).await.unwrap();
    assert!(client.subscriptions().is_empty());
    assert_eq!(hub.received("unsubscribe_events")[0]["subscription"], id);

    let err = client.unsubscribe(id).await.unwrap_err();
    assert!(matches!(err, CoreError::SubscriptionNotFound { .. }));
    assert_eq!(err.to_string(), format!("Subscription not found: {id}"));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_unknown_id() {
    let hub = FakeHub::start().await;
    let (client, _signals) = ready_client(config(&hub.url)).await;

    let err = client.unsubscribe(777).await.unwrap_err();
    assert!(matches!(err, CoreError::SubscriptionNotFound { id: 777 }));
    assert!(hub.received("unsubscribe_events").is_empty());
    client.close().await.unwrap();
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_registry_update_refetches_and_replaces_mapping() {
    let hub = FakeHub::start().await;
    let (client, mut signals) = ready_client(config(&hub.url)).await;
    assert_eq!(client.store().device_count(), 2);

    hub.set(
        "config/device_registry/list",
        json!([{ "id": "d1", "name": "Lamp", "area_id": "kitchen" }]),
    );
    hub.push(json!({
        "id": 8,
        "type": "event",
        "event": {
            "event_type": "device_registry_updated",
            "data": { "action": "remove", "device_id": "d2" }
        }
    }));
    wait_for(&mut signals, "devices").await;

    assert_eq!(client.store().device_count(), 1);
    assert!(client.store().device("d2").is_none());
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_state_changes_only_touch_known_entities() {
    let hub = FakeHub::start().await;
    let (client, mut signals) = ready_client(config(&hub.url)).await;

    for (entity_id, state) in [("switch.stranger", "on"), ("light.bedroom", "on")] {
        hub.push(json!({
            "id": 8,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {
                    "entity_id": entity_id,
                    "old_state": null,
                    "new_state": { "entity_id": entity_id, "state": state, "attributes": {} }
                }
            }
        }));
    }

    let HubSignal::StateChanged(change) = wait_for(&mut signals, "state_changed").await else {
        unreachable!()
    };
    assert_eq!(change.entity_id, "light.bedroom");
    assert_eq!(client.store().state("light.bedroom").unwrap().state.to_string(), "on");
    assert!(client.store().state("switch.stranger").is_none());
    assert_eq!(client.store().state_count(), 2);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_service_call_events_are_forwarded() {
    let hub = FakeHub::start().await;
    let (client, mut signals) = ready_client(config(&hub.url)).await;

    hub.push(json!({
        "id": 8,
        "type": "event",
        "event": {
            "event_type": "call_service",
            "data": { "domain": "light", "service": "turn_off" }
        }
    }));
    let HubSignal::CallService(event) = wait_for(&mut signals, "call_service").await else {
        unreachable!()
    };
    assert_eq!(event.data["service"], "turn_off");
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_result_for_unknown_id_reports_error() {
    let hub = FakeHub::start().await;
    let (client, mut signals) = ready_client(config(&hub.url)).await;

    hub.push(json!({ "id": 31337, "type": "result", "success": true, "result": null }));
    let HubSignal::Error(message) = wait_for(&mut signals, "error").await else {
        unreachable!()
    };
    assert_eq!(message, "Received result for unknown request id 31337");
    assert!(client.is_connected());
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_event_without_payload_reports_error() {
    let hub = FakeHub::start().await;
    let (client, mut signals) = ready_client(config(&hub.url)).await;

    hub.push(json!({ "id": 8, "type": "event" }));
    let HubSignal::Error(message) = wait_for(&mut signals, "error").await else {
        unreachable!()
    };
    assert_eq!(message, "Event message without payload (id 8)");
    assert_eq!(client.state(), ConnectionState::Ready);
    client.close().await.unwrap();
}

// ── Heartbeat and reconnect ─────────────────────────────────────────

#[tokio::test]
async fn test_heartbeat_timeout_forces_close_and_reconnects_once() {
    let hub = FakeHub::start().await;
    hub.answer_pings(false);
    let mut config = config(&hub.url);
    config.heartbeat_interval = Duration::from_millis(200);
    config.heartbeat_timeout = Duration::from_millis(100);
    config.reconnect = retrying(3);
    let (client, mut signals) = ready_client(config).await;

    let HubSignal::Disconnected { reason } = wait_for(&mut signals, "disconnected").await else {
        unreachable!()
    };
    assert_eq!(reason, "heartbeat timeout");
    hub.answer_pings(true);

    wait_for(&mut signals, "connected").await;
    wait_for(&mut signals, "subscribed").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(hub.connections(), 2);
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(client.reconnect_budget(), 3);
    // The cache survived the reconnect.
    assert_eq!(client.store().device_count(), 2);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_zero_retry_budget_stays_disconnected() {
    let hub = FakeHub::start().await;
    let mut config = config(&hub.url);
    config.reconnect = retrying(0);
    let (client, mut signals) = ready_client(config).await;

    hub.drop_connection();
    wait_for(&mut signals, "disconnected").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.reconnect_pending().await);
    assert_eq!(hub.connections(), 1);

    let err = client.fetch("get_states", None).await.unwrap_err();
    assert!(err.is_not_connected());
}

#[tokio::test]
async fn test_close_cancels_pending_reconnect() {
    let hub = FakeHub::start().await;
    let mut config = config(&hub.url);
    config.reconnect = ReconnectConfig {
        delay: Duration::from_millis(300),
        ..retrying(5)
    };
    let (client, mut signals) = ready_client(config).await;

    hub.drop_connection();
    wait_for(&mut signals, "disconnected").await;
    assert!(client.reconnect_pending().await);

    client.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(hub.connections(), 1);
}

#[tokio::test]
async fn test_reconnect_during_bootstrap_reissues_reserved_requests() {
    let hub = FakeHub::start().await;
    hub.stay_silent("subscribe_events");
    let mut config = config(&hub.url);
    config.reconnect = retrying(3);
    let client = HubClient::new(config);
    let mut signals = client.signals();

    client.connect().await.unwrap();
    eventually("the first subscribe_events", || hub.received("subscribe_events").len() == 1).await;
    assert_eq!(client.state(), ConnectionState::Subscribing);

    // The subscription is still unanswered when the socket drops.
    hub.speak("subscribe_events");
    hub.drop_connection();
    wait_for(&mut signals, "disconnected").await;
    wait_for(&mut signals, "subscribed").await;

    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(hub.connections(), 2);
    let subscribe = hub.received("subscribe_events");
    assert_eq!(subscribe.len(), 2);
    assert_eq!(subscribe[1]["id"], 8);
    assert_eq!(hub.received("get_states").len(), 2);
    client.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_socket_lost_right_after_auth_keeps_retrying() {
    let hub = FakeHub::start().await;
    let mut config = config(&hub.url);
    config.reconnect = retrying(5);
    let (client, _signals) = ready_client(config).await;

    for round in 1..=5 {
        let before = hub.connections();
        // Two sessions in a row die right after authenticating.
        hub.close_after_auth(2);
        hub.drop_connection();

        eventually("the third session", || hub.connections() == before + 3).await;
        wait_for_state(&client, ConnectionState::Ready).await;
        assert!(client.is_connected(), "round {round}");
    }
    client.close().await.unwrap();
}
