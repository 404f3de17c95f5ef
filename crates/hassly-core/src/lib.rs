//! Persistent client for the Home Assistant WebSocket API, built on
//! `hassly-api`.
//!
//! - **[`HubClient`]**: central facade. [`connect()`](HubClient::connect)
//!   dials and authenticates, then bootstraps the registry cache in the
//!   background and subscribes to hub events. Requests are correlated by id
//!   and bounded by a timeout; a heartbeat detects dead sockets and the
//!   reconnect policy brings the session back.
//!
//! - **[`RegistryStore`]**: lock-free mirror of the device, entity, area and
//!   label registries plus entity states, hub config and the service
//!   catalogue. Registry fetches replace a mapping wholesale; state changes
//!   only ever touch entities the registry knows about.
//!
//! - **[`HubSignal`]**: every lifecycle transition, cache update, event and
//!   error the client reports, fanned out over a broadcast channel.
//!
//! - **[`RegistryStream<T>`]**: subscription handle vended by the store, with
//!   `current()` / `latest()` / `changed()`.

mod client;
pub mod config;
mod connection;
pub mod error;
mod heartbeat;
pub mod ids;
pub mod model;
mod pending;
mod reconnect;
mod router;
pub mod signal;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{CLOSE_NORMAL, ConnectionState, HubClient, RequestOptions};
pub use config::{Backoff, ClientConfig, ReconnectConfig};
pub use error::CoreError;
pub use heartbeat::HeartbeatMonitor;
pub use signal::{HubSignal, SignalBus, Snapshot};
pub use store::RegistryStore;
pub use stream::{RegistryStream, RegistryWatchStream};

pub use hassly_api::HubEvent;
pub use model::{
    Area, Device, Entity, HubConfig, Label, RegistryKind, ServiceCall, ServiceResponse, Services,
    State, StateChange, StateValue,
};
