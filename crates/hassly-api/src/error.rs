use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the `hassly-api` crate.
///
/// Covers the protocol surface only: address validation, TLS setup,
/// dialing, the auth handshake and frame decoding. `hassly-core` maps
/// these into the session-level [`CoreError`](../hassly_core/enum.CoreError.html).
#[derive(Debug, Error)]
pub enum Error {
    // ── Address ─────────────────────────────────────────────────────
    /// The URL is not a `ws://` or `wss://` address.
    #[error("Invalid address {url}: {reason}")]
    InvalidAddress { url: String, reason: String },

    // ── TLS ─────────────────────────────────────────────────────────
    /// CA certificate file could not be read.
    #[error("Failed to read CA certificate {}: {source}", path.display())]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TLS configuration or certificate parsing error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket dial or read/write failure.
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    /// Peer closed the socket.
    #[error("WebSocket closed (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    /// An operation did not finish within its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    // ── Handshake ───────────────────────────────────────────────────
    /// The hub rejected the access token.
    #[error("Authentication rejected: {message}")]
    AuthRejected { message: String },

    /// The hub sent something other than the expected handshake message.
    #[error("Unexpected handshake message: expected {expected}, got {got}")]
    UnexpectedHandshake { expected: &'static str, got: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Inbound frame was not a valid protocol message.
    #[error("Decode error: {message}")]
    Decode { message: String, frame: String },

    /// Outbound message could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for failures that happened during the auth handshake
    /// (including TLS setup), as opposed to plain transport trouble.
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::AuthRejected { .. }
                | Self::UnexpectedHandshake { .. }
                | Self::Tls(_)
                | Self::Decode { .. }
        )
    }

    /// Returns `true` if retrying the whole connection might help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Closed { .. } | Self::Timeout { .. }
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::Tls(e) => Self::Tls(e.to_string()),
            WsError::Url(e) => Self::InvalidAddress {
                url: String::new(),
                reason: e.to_string(),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}
