// ── Runtime connection configuration ──
//
// These types describe *how* to connect to a hub. They carry the access
// token and connection tuning, but never touch disk: the CLI (through
// hassly-config) builds a `ClientConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use hassly_api::TlsOptions;

/// Configuration for a [`HubClient`](crate::HubClient) session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://homeassistant.local:8123/api/websocket`.
    /// Validated on `connect()`, not here.
    pub url: String,
    /// Long-lived access token.
    pub token: SecretString,
    /// Extra CA bundle for `wss://` endpoints.
    pub ca_cert: Option<PathBuf>,
    /// Verify the hub certificate. Only meaningful for `wss://`.
    pub verify_ssl: bool,
    /// Default deadline for requests, the auth handshake and `close()`.
    pub response_timeout: Duration,
    /// Interval between application-level pings.
    pub heartbeat_interval: Duration,
    /// How long a ping may go unanswered before the socket is dropped.
    pub heartbeat_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token: SecretString) -> Self {
        Self {
            url: url.into(),
            token,
            ca_cert: None,
            verify_ssl: true,
            response_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub(crate) fn tls_options(&self) -> TlsOptions {
        TlsOptions {
            ca_cert: self.ca_cert.clone(),
            verify_peer: self.verify_ssl,
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// How the delay between reconnection attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Wait `delay` before every attempt.
    #[default]
    Fixed,
    /// `delay * 2^attempt`, capped at `max_delay`, with deterministic jitter.
    Exponential,
}

/// Automatic reconnection after an unexpected close.
///
/// A zero `delay` or a zero `max_retries` disables automatic reconnection;
/// `connect()` still works manually.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before an attempt (the initial delay for exponential backoff).
    pub delay: Duration,
    /// Attempts allowed between two successful connections.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Upper bound for exponential backoff.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_retries: 10,
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl ReconnectConfig {
    /// Reconnection switched off entirely.
    pub fn disabled() -> Self {
        Self {
            delay: Duration::ZERO,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero() && self.max_retries > 0
    }

    /// Delay before the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => calculate_backoff(attempt, self.delay, self.max_delay),
        }
    }
}

fn calculate_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = initial.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(max.as_secs_f64());

    // Deterministic jitter seeded from the attempt number; spreads a fleet
    // of clients without needing an RNG. Never exceeds `max`.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).clamp(0.0, max.as_secs_f64());

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
