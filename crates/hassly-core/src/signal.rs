// ── Signal bus ──
//
// Typed publish/subscribe surface for everything the client reports:
// lifecycle changes, registry snapshots, hub events and errors. Any number
// of independent subscribers can listen; a slow subscriber only lags itself.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use hassly_api::HubEvent;

use crate::model::{Area, Device, Entity, HubConfig, Label, RegistryKind, Services, State, StateChange};

const SIGNAL_CHANNEL_SIZE: usize = 256;

/// Snapshot of a registry as carried by a signal.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// A signal emitted by [`HubClient`](crate::HubClient).
#[derive(Debug, Clone)]
pub enum HubSignal {
    /// The WebSocket is open and authenticated.
    SocketOpened,
    /// Handshake finished. Bootstrap continues in the background.
    Connected { version: Option<String> },
    /// The event subscription was accepted; the session is ready.
    Subscribed,
    Devices(Snapshot<Device>),
    Entities(Snapshot<Entity>),
    Areas(Snapshot<Area>),
    Labels(Snapshot<Label>),
    States(Snapshot<State>),
    Config(Arc<HubConfig>),
    Services(Arc<Services>),
    /// Any hub event delivered on a subscription.
    Event(Arc<HubEvent>),
    /// A `state_changed` event that was applied to the cache.
    StateChanged(Arc<StateChange>),
    /// A `call_service` event echoed by the hub.
    CallService(Arc<HubEvent>),
    Ping,
    Pong,
    Error(String),
    Disconnected { reason: String },
    SocketClosed { code: u16, reason: String },
}

impl HubSignal {
    /// Stable name, used in logs and by the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SocketOpened => "socket_opened",
            Self::Connected { .. } => "connected",
            Self::Subscribed => "subscribed",
            Self::Devices(_) => "devices",
            Self::Entities(_) => "entities",
            Self::Areas(_) => "areas",
            Self::Labels(_) => "labels",
            Self::States(_) => "states",
            Self::Config(_) => "config",
            Self::Services(_) => "services",
            Self::Event(_) => "event",
            Self::StateChanged(_) => "state_changed",
            Self::CallService(_) => "call_service",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error(_) => "error",
            Self::Disconnected { .. } => "disconnected",
            Self::SocketClosed { .. } => "socket_closed",
        }
    }

    /// Registry the signal carries a snapshot of, if any.
    pub fn registry(&self) -> Option<RegistryKind> {
        match self {
            Self::Devices(_) => Some(RegistryKind::Devices),
            Self::Entities(_) => Some(RegistryKind::Entities),
            Self::Areas(_) => Some(RegistryKind::Areas),
            Self::Labels(_) => Some(RegistryKind::Labels),
            _ => None,
        }
    }
}

/// Broadcast fan-out for [`HubSignal`]s.
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<HubSignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubSignal> {
        self.tx.subscribe()
    }

    /// Publish `signal`. Having no subscribers is fine.
    pub fn emit(&self, signal: HubSignal) {
        trace!(signal = signal.name(), "emit");
        let _ = self.tx.send(signal);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.emit(HubSignal::Error(message.into()));
    }
}
