// ── Client facade ──
//
// Full lifecycle of one hub session: dial, authenticate, bootstrap the
// registry cache, route events, correlate requests and recover from
// dropped connections. Cheap to clone; every clone drives the same session.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::SplitStream;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use hassly_api::transport::{self, WsStream};
use hassly_api::{CommandFrame, InboundMessage, ResultMessage, WsMessage, authenticate, message};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::CoreError;
use crate::heartbeat::{HeartbeatLink, HeartbeatMonitor};
use crate::ids::{self, RequestIds, reserved};
use crate::model::{RegistryKind, ServiceCall, ServiceResponse};
use crate::pending::PendingTable;
use crate::reconnect::{ReconnectPolicy, ReconnectTarget, Schedule};
use crate::router::{self, Route};
use crate::signal::{HubSignal, SignalBus};
use crate::store::RegistryStore;

/// Close code sent by [`HubClient::close`].
pub const CLOSE_NORMAL: u16 = 1000;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingAuth,
    /// Authenticated; bootstrap and event subscription in progress.
    Subscribing,
    /// Event subscription accepted.
    Ready,
    Closing,
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    /// Whether requests may be issued.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Subscribing | Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::AwaitingAuth => f.write_str("authenticating"),
            Self::Subscribing => f.write_str("subscribing"),
            Self::Ready => f.write_str("ready"),
            Self::Closing => f.write_str("closing"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
        }
    }
}

// ── RequestOptions ───────────────────────────────────────────────

/// Per-request overrides for [`HubClient::fetch_with`] and
/// [`HubClient::call_service`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Use this correlation id instead of the next sequential one.
    pub id: Option<u64>,
    /// Override the configured response timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    #[must_use]
    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ── HubClient ────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Does not connect on
/// construction; call [`connect()`](Self::connect).
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    store: Arc<RegistryStore>,
    signals: SignalBus,
    state: watch::Sender<ConnectionState>,
    pending: PendingTable,
    ids: RequestIds,
    /// Present while a socket is up; swapped out on close.
    connection: ArcSwapOption<Connection>,
    heartbeat: HeartbeatMonitor,
    reconnect: Arc<ReconnectPolicy>,
    /// Caller-issued event subscriptions on the current connection.
    subscriptions: DashMap<u64, Option<String>>,
    hub_version: ArcSwapOption<String>,
}

impl HubClient {
    pub fn new(config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let heartbeat = HeartbeatMonitor::new(config.heartbeat_interval, config.heartbeat_timeout);
        let reconnect = Arc::new(ReconnectPolicy::new(config.reconnect.clone()));

        Self {
            inner: Arc::new(ClientInner {
                config,
                store: Arc::new(RegistryStore::new()),
                signals: SignalBus::new(),
                state,
                pending: PendingTable::new(),
                ids: RequestIds::new(),
                connection: ArcSwapOption::empty(),
                heartbeat,
                reconnect,
                subscriptions: DashMap::new(),
                hub_version: ArcSwapOption::empty(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The registry cache. Survives reconnects; only `clear()` empties it.
    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.inner.store
    }

    /// Subscribe to every signal the client emits from now on.
    pub fn signals(&self) -> broadcast::Receiver<HubSignal> {
        self.inner.signals.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    /// Version reported by the hub during the last handshake.
    pub fn hub_version(&self) -> Option<String> {
        self.inner.hub_version.load_full().map(|v| (*v).clone())
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.inner.heartbeat
    }

    /// Requests currently waiting for a result.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Reconnect attempts left before the client gives up.
    pub fn reconnect_budget(&self) -> u32 {
        self.inner.reconnect.remaining()
    }

    /// Whether a reconnect is scheduled or in progress.
    pub async fn reconnect_pending(&self) -> bool {
        self.inner.reconnect.is_pending().await
    }

    /// Active caller-issued event subscriptions.
    pub fn subscriptions(&self) -> Vec<u64> {
        self.inner.subscriptions.iter().map(|e| *e.key()).collect()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect and authenticate. Returns the hub version, if reported.
    ///
    /// Bootstrap (registries, states, config, services and the event
    /// subscription) continues in the background and is reported through
    /// signals. Fails with [`CoreError::AlreadyConnected`] if a session is
    /// up or another connect is in progress.
    pub async fn connect(&self) -> Result<Option<String>, CoreError> {
        let claimed = self.inner.state.send_if_modified(|s| match s {
            ConnectionState::Disconnected | ConnectionState::Reconnecting { .. } => {
                *s = ConnectionState::Connecting;
                true
            }
            _ => false,
        });
        if !claimed {
            return Err(CoreError::AlreadyConnected);
        }

        match self.establish().await {
            Ok(version) => Ok(version),
            Err(e) => {
                self.inner.state.send_if_modified(|s| {
                    if matches!(s, ConnectionState::Connecting | ConnectionState::AwaitingAuth) {
                        *s = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                warn!(error = %e, "connect failed");
                self.inner.signals.error(e.to_string());
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<Option<String>, CoreError> {
        let config = &self.inner.config;
        let url = transport::validate_address(&config.url)?;
        let connector = transport::build_connector(&url, &config.tls_options())?;

        let mut ws = transport::dial(&url, connector, config.response_timeout)
            .await
            .map_err(|e| match e {
                hassly_api::Error::Transport(reason) => CoreError::ConnectionFailed {
                    url: url.to_string(),
                    reason,
                },
                other => other.into(),
            })?;

        if !self.advance(&ConnectionState::Connecting, ConnectionState::AwaitingAuth) {
            close_quietly(ws).await;
            return Err(aborted());
        }

        let hello = match authenticate(&mut ws, &config.token, config.response_timeout).await {
            Ok(hello) => hello,
            Err(e) => {
                close_quietly(ws).await;
                return Err(CoreError::from_handshake(e));
            }
        };

        let conn = self.install(ws).await;
        if !self.advance(&ConnectionState::AwaitingAuth, ConnectionState::Subscribing) {
            self.detach(&conn);
            conn.force_close("connect aborted");
            return Err(aborted());
        }

        self.inner.ids.reset();
        let dropped = self.inner.subscriptions.len();
        if dropped > 0 {
            debug!(dropped, "dropping subscriptions of the previous connection");
            self.inner.subscriptions.clear();
        }
        self.inner
            .hub_version
            .store(hello.version.clone().map(Arc::new));
        // A retry task that is still sleeping finds the session up and
        // stops on its own.
        self.inner.reconnect.reset();

        self.inner.heartbeat.stop().await;
        self.inner
            .heartbeat
            .start(Arc::clone(&conn) as Arc<dyn HeartbeatLink>, self.inner.signals.clone())
            .await;
        self.inner.signals.emit(HubSignal::SocketOpened);

        tokio::spawn(self.clone().bootstrap());

        info!(version = ?hello.version, "connected to Home Assistant");
        self.inner.signals.emit(HubSignal::Connected {
            version: hello.version.clone(),
        });
        Ok(hello.version)
    }

    /// Split the socket, spawn its tasks and make it the current connection.
    async fn install(&self, ws: WsStream) -> Arc<Connection> {
        let (sink, stream) = ws.split();
        let conn = Connection::spawn_writer(sink);
        self.inner.connection.store(Some(Arc::clone(&conn)));

        let reader = tokio::spawn(self.clone().read_loop(Arc::clone(&conn), stream));
        conn.set_reader(reader).await;
        conn
    }

    /// Close the session with a normal close code.
    pub async fn close(&self) -> Result<(), CoreError> {
        self.close_with(CLOSE_NORMAL, "client closing").await
    }

    /// Close the session.
    ///
    /// Idempotent. Cancels the heartbeat and any pending reconnect, sends a
    /// close frame and waits (bounded by the response timeout) for the hub
    /// to acknowledge it. Always ends `Disconnected`, even on error.
    pub async fn close_with(&self, code: u16, reason: &str) -> Result<(), CoreError> {
        let mut previous = ConnectionState::Disconnected;
        self.inner.state.send_if_modified(|s| {
            previous = s.clone();
            match s {
                ConnectionState::Disconnected | ConnectionState::Closing => false,
                _ => {
                    *s = ConnectionState::Closing;
                    true
                }
            }
        });

        self.inner.reconnect.cancel().await;
        self.inner.heartbeat.stop().await;

        match previous {
            ConnectionState::Closing => {
                debug!("close already in progress");
                return Ok(());
            }
            ConnectionState::Disconnected => {
                // A retry may have been about to report `Reconnecting`.
                self.inner.state.send_if_modified(|s| {
                    if matches!(s, ConnectionState::Reconnecting { .. }) {
                        *s = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                debug!("close on a disconnected session");
                return Ok(());
            }
            _ => {}
        }

        let result = match self.inner.connection.swap(None) {
            Some(conn) => {
                info!(code, reason, "closing connection");
                let result = conn
                    .shutdown(code, reason, self.inner.config.response_timeout)
                    .await;
                self.release_reserved_ids();
                self.inner.signals.emit(HubSignal::Disconnected {
                    reason: reason.to_owned(),
                });
                result
            }
            None => Ok(()),
        };

        self.inner.state.send_replace(ConnectionState::Disconnected);
        result
    }

    // ── Requests ─────────────────────────────────────────────────

    /// Send `command` and wait for its result payload.
    pub async fn fetch(&self, command: &str, params: Option<Value>) -> Result<Value, CoreError> {
        self.fetch_with(command, params, RequestOptions::default()).await
    }

    /// [`fetch`](Self::fetch) with an explicit id and/or timeout.
    pub async fn fetch_with(
        &self,
        command: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, CoreError> {
        check_caller_id(options)?;
        let frame = CommandFrame::new(command, 0).with_params(params.unwrap_or(Value::Null));
        self.request(frame, options, "Fetch").await
    }

    /// Bootstrap and refresh fetches on their fixed session ids.
    async fn fetch_reserved(&self, command: &str, id: u64) -> Result<Value, CoreError> {
        self.request(
            CommandFrame::new(command, id),
            RequestOptions::default().id(id),
            "Fetch",
        )
        .await
    }

    /// Invoke a service and return `{context, response?}`.
    pub async fn call_service(
        &self,
        call: ServiceCall,
        options: RequestOptions,
    ) -> Result<ServiceResponse, CoreError> {
        check_caller_id(options)?;
        let frame = CommandFrame::call_service(
            0,
            &call.domain,
            &call.service,
            call.entity_id.as_deref(),
            call.service_data,
            call.return_response,
        );
        let result = self.request(frame, options, "Call service").await?;
        if result.is_null() {
            return Ok(ServiceResponse::default());
        }
        serde_json::from_value(result).map_err(|e| CoreError::Decode {
            message: format!("call_service: {e}"),
        })
    }

    /// Subscribe to hub events, optionally of a single type. Returns the
    /// subscription id events will carry.
    pub async fn subscribe(&self, event_type: Option<&str>) -> Result<u64, CoreError> {
        let id = self.next_id();
        self.request(
            CommandFrame::subscribe_events(id, event_type),
            RequestOptions::default().id(id),
            "Subscribe",
        )
        .await?;
        self.inner
            .subscriptions
            .insert(id, event_type.map(str::to_owned));
        info!(id, event_type, "subscribed to events");
        Ok(id)
    }

    /// Cancel a subscription returned by [`subscribe`](Self::subscribe).
    pub async fn unsubscribe(&self, subscription: u64) -> Result<(), CoreError> {
        if !self.inner.subscriptions.contains_key(&subscription) {
            return Err(CoreError::SubscriptionNotFound { id: subscription });
        }
        self.request(
            CommandFrame::unsubscribe_events(0, subscription),
            RequestOptions::default(),
            "Unsubscribe",
        )
        .await?;
        self.inner.subscriptions.remove(&subscription);
        info!(subscription, "unsubscribed from events");
        Ok(())
    }

    async fn request(
        &self,
        mut frame: CommandFrame,
        options: RequestOptions,
        operation: &'static str,
    ) -> Result<Value, CoreError> {
        if !self.is_connected() {
            return Err(CoreError::NotConnected { operation });
        }
        let conn = self
            .inner
            .connection
            .load_full()
            .filter(|c| c.is_open())
            .ok_or(CoreError::TransportClosed { operation })?;

        frame.id = options.id.unwrap_or_else(|| self.next_id());
        let timeout = options
            .timeout
            .unwrap_or(self.inner.config.response_timeout);

        let ticket = self.inner.pending.register(frame.id, &frame.command)?;
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                self.inner.pending.discard(frame.id);
                return Err(e.into());
            }
        };
        if !conn.send_text(text) {
            self.inner.pending.discard(frame.id);
            return Err(CoreError::TransportClosed { operation });
        }
        debug!(id = frame.id, command = %frame.command, "request sent");

        self.inner.pending.wait(ticket, timeout).await
    }

    fn next_id(&self) -> u64 {
        self.inner.ids.next(|id| {
            self.inner.pending.contains(id) || self.inner.subscriptions.contains_key(&id)
        })
    }

    // ── Bootstrap and refresh ────────────────────────────────────

    async fn bootstrap(self) {
        let started = Instant::now();

        // Entities first: states are only kept for known entities.
        let registries = tokio::join!(
            self.refresh_registry(RegistryKind::Devices),
            self.refresh_registry(RegistryKind::Entities),
            self.refresh_registry(RegistryKind::Areas),
            self.refresh_registry(RegistryKind::Labels),
        );
        for (kind, result) in [
            (RegistryKind::Devices, registries.0),
            (RegistryKind::Entities, registries.1),
            (RegistryKind::Areas, registries.2),
            (RegistryKind::Labels, registries.3),
        ] {
            if let Err(e) = result {
                self.bootstrap_failed(kind.command(), &e);
            }
        }

        let (states, config, services, subscribed) = tokio::join!(
            self.refresh_states(),
            self.refresh_config(),
            self.refresh_services(),
            self.subscribe_all_events(),
        );
        if let Err(e) = states {
            self.bootstrap_failed("get_states", &e);
        }
        if let Err(e) = config {
            self.bootstrap_failed("get_config", &e);
        }
        if let Err(e) = services {
            self.bootstrap_failed("get_services", &e);
        }

        match subscribed {
            Ok(()) => {
                self.advance(&ConnectionState::Subscribing, ConnectionState::Ready);
                self.inner.signals.emit(HubSignal::Subscribed);
                info!(elapsed_ms = started.elapsed().as_millis(), "bootstrap complete");
            }
            Err(e) => self.bootstrap_failed("subscribe_events", &e),
        }
    }

    fn bootstrap_failed(&self, command: &str, err: &CoreError) {
        warn!(command, error = %err, "bootstrap request failed");
        self.inner
            .signals
            .error(format!("Bootstrap request {command} failed: {err}"));
    }

    async fn subscribe_all_events(&self) -> Result<(), CoreError> {
        self.fetch_reserved("subscribe_events", reserved::EVENTS_SUBSCRIPTION)
            .await
            .map(|_| ())
    }

    /// Fetch one registry with its reserved id and replace the cached copy.
    pub async fn refresh_registry(&self, kind: RegistryKind) -> Result<usize, CoreError> {
        let result = self
            .fetch_reserved(kind.command(), kind.reserved_id())
            .await?;
        let signal = self.inner.store.apply_registry(kind, result)?;
        self.inner.signals.emit(signal);

        let count = self.inner.store.registry_len(kind);
        info!(registry = %kind, count, "received {count} {kind}");
        Ok(count)
    }

    /// Fetch all states and replace the cached copy.
    pub async fn refresh_states(&self) -> Result<usize, CoreError> {
        let result = self
            .fetch_reserved("get_states", reserved::STATES)
            .await?;
        let signal = self.inner.store.apply_states(result)?;
        self.inner.signals.emit(signal);

        let count = self.inner.store.state_count();
        info!(count, "received {count} states");
        Ok(count)
    }

    pub async fn refresh_config(&self) -> Result<(), CoreError> {
        let result = self
            .fetch_reserved("get_config", reserved::CONFIG)
            .await?;
        let signal = self.inner.store.apply_config(result)?;
        self.inner.signals.emit(signal);
        debug!("received config");
        Ok(())
    }

    pub async fn refresh_services(&self) -> Result<(), CoreError> {
        let result = self
            .fetch_reserved("get_services", reserved::SERVICES)
            .await?;
        let signal = self.inner.store.apply_services(result)?;
        self.inner.signals.emit(signal);
        debug!("received services");
        Ok(())
    }

    // ── Inbound path ─────────────────────────────────────────────

    async fn read_loop(self, conn: Arc<Connection>, mut stream: SplitStream<WsStream>) {
        let (code, reason) = loop {
            let frame = tokio::select! {
                biased;
                () = conn.cancelled() => {
                    let reason = conn
                        .forced_reason()
                        .unwrap_or_else(|| "connection cancelled".into());
                    break (1006, reason);
                }
                frame = stream.next() => frame,
            };

            match frame {
                Some(Ok(WsMessage::Text(text))) => self.dispatch(text.as_str()),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                    self.inner.heartbeat.note_keepalive();
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame.map_or_else(
                        || (1005, String::new()),
                        |f| (u16::from(f.code), f.reason.to_string()),
                    );
                }
                Some(Ok(_)) => trace!("ignoring non-text frame"),
                Some(Err(e)) => break (1006, e.to_string()),
                None => break (1006, "stream ended".to_owned()),
            }
        };

        conn.finish();
        self.on_transport_closed(&conn, code, reason).await;
    }

    fn dispatch(&self, text: &str) {
        let message = match message::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        match message {
            InboundMessage::Result(result) => self.on_result(result),
            InboundMessage::Event { id, event: Some(event) } => {
                if id != reserved::EVENTS_SUBSCRIPTION && !self.inner.subscriptions.contains_key(&id) {
                    debug!(id, "event for an unknown subscription");
                }
                if let Route::Refresh(kind) = router::route_event(event, &self.inner.store, &self.inner.signals) {
                    let client = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = client.refresh_registry(kind).await {
                            warn!(registry = %kind, error = %e, "registry re-fetch failed, keeping cached copy");
                        }
                    });
                }
            }
            InboundMessage::Event { id, event: None } => {
                warn!(id, "event message without payload");
                self.inner
                    .signals
                    .error(format!("Event message without payload (id {id})"));
            }
            InboundMessage::Pong { id } => self.on_pong(id),
            other => debug!(kind = other.kind(), "ignoring unexpected message"),
        }
    }

    fn on_result(&self, result: ResultMessage) {
        let id = result.id;
        let outcome = if result.success {
            Ok(result.result.unwrap_or(Value::Null))
        } else {
            let remote = result.error.unwrap_or_default();
            let message = remote.message.unwrap_or_else(|| "Unknown error".to_owned());
            self.inner
                .signals
                .error(format!("Request {id} failed: {message}"));
            Err(CoreError::Remote {
                code: remote.code,
                message,
            })
        };

        if !self.inner.pending.complete(id, outcome) {
            warn!(id, "result for unknown request");
            self.inner
                .signals
                .error(format!("Received result for unknown request id {id}"));
        }
    }

    fn on_pong(&self, id: u64) {
        if id == reserved::HEARTBEAT {
            self.inner.heartbeat.pong_received();
        } else if !self.inner.pending.complete(id, Ok(Value::Null)) {
            debug!(id, "pong for unknown request");
        }
        self.inner.signals.emit(HubSignal::Pong);
    }

    async fn on_transport_closed(&self, conn: &Arc<Connection>, code: u16, reason: String) {
        self.inner.signals.emit(HubSignal::SocketClosed {
            code,
            reason: reason.clone(),
        });

        if *self.inner.state.borrow() == ConnectionState::Closing {
            debug!(code, "socket closed during shutdown");
            return;
        }
        if !self.detach(conn) {
            debug!(code, "stale connection closed");
            return;
        }

        self.release_reserved_ids();
        self.inner.heartbeat.stop().await;
        self.inner.state.send_if_modified(|s| {
            if *s == ConnectionState::Closing {
                false
            } else {
                *s = ConnectionState::Disconnected;
                true
            }
        });
        warn!(code, reason = %reason, "connection lost");

        // Scheduled before the signal so observers see the retry pending.
        match self.inner.reconnect.schedule(self.clone()).await {
            Schedule::Started => {}
            Schedule::AlreadyPending => debug!("reconnect already scheduled"),
            Schedule::Disabled => debug!("staying disconnected"),
        }
        self.inner
            .signals
            .emit(HubSignal::Disconnected { reason });
    }

    // ── Helpers ──────────────────────────────────────────────────

    /// Move from `from` to `to`; `false` if the state changed meanwhile.
    fn advance(&self, from: &ConnectionState, to: ConnectionState) -> bool {
        self.inner.state.send_if_modified(|s| {
            if s == from {
                *s = to;
                true
            } else {
                false
            }
        })
    }

    /// Fail the bootstrap and refresh requests of a connection that is gone.
    /// Their answers can no longer arrive, and the next bootstrap needs the
    /// same ids. Caller-issued requests still end by result or timeout.
    fn release_reserved_ids(&self) {
        let failed = self
            .inner
            .pending
            .fail_where(ids::is_reserved, || CoreError::TransportClosed { operation: "Fetch" });
        if failed > 0 {
            debug!(failed, "released reserved request ids");
        }
    }

    /// Clear `conn` if it is still the current connection.
    fn detach(&self, conn: &Arc<Connection>) -> bool {
        let current = self.inner.connection.load_full();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
            self.inner.connection.store(None);
            true
        } else {
            false
        }
    }
}

impl ReconnectTarget for HubClient {
    fn on_scheduled(&self, attempt: u32, _delay: Duration) {
        self.inner.state.send_if_modified(|s| {
            if matches!(s, ConnectionState::Disconnected | ConnectionState::Reconnecting { .. }) {
                *s = ConnectionState::Reconnecting { attempt };
                true
            } else {
                false
            }
        });
    }

    // Boxed: `connect` eventually spawns the task that calls this, so the
    // future's `Send` bound has to be nominal rather than inferred.
    fn attempt(&self, attempt: u32) -> BoxFuture<'static, bool> {
        let client = self.clone();
        Box::pin(async move {
            match client.connect().await {
                // The new socket may already be gone again.
                Ok(_) => client.is_connected(),
                Err(CoreError::AlreadyConnected) => {
                    debug!(attempt, "session already re-established");
                    true
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    false
                }
            }
        })
    }

    fn on_exhausted(&self) {
        self.inner.state.send_if_modified(|s| {
            if matches!(s, ConnectionState::Reconnecting { .. }) {
                *s = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        self.inner
            .signals
            .error("Reconnect attempts exhausted, staying disconnected");
    }
}

/// Caller-supplied ids must stay clear of the reserved range.
fn check_caller_id(options: RequestOptions) -> Result<(), CoreError> {
    match options.id {
        Some(id) if ids::is_reserved(id) => Err(CoreError::ReservedRequestId { id }),
        _ => Ok(()),
    }
}

fn aborted() -> CoreError {
    CoreError::ConnectionFailed {
        url: String::new(),
        reason: "session closed while connecting".into(),
    }
}

async fn close_quietly(mut ws: WsStream) {
    let _ = tokio::time::timeout(Duration::from_secs(1), ws.close(None)).await;
}

// ── Tests ────────────────────────────────────────────────────────────
