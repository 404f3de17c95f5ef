// ── Core error types ──
//
// Session-level errors from hassly-core. Callers never see tungstenite
// or serde_json errors directly: the `From<hassly_api::Error>` impl maps
// protocol failures onto the kinds below.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Invalid address {url}: {reason}")]
    InvalidAddress { url: String, reason: String },

    #[error("Already connected to Home Assistant")]
    AlreadyConnected,

    #[error("{operation} error: not connected to Home Assistant")]
    NotConnected { operation: &'static str },

    #[error("{operation} error: transport is closed")]
    TransportClosed { operation: &'static str },

    #[error("Cannot connect to Home Assistant at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Handshake failed: {message}")]
    HandshakeFailed { message: String },

    #[error("Failed to read CA certificate {}: {source}", path.display())]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Request '{command}' (id {id}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        command: String,
        id: u64,
        timeout_ms: u64,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Home Assistant returned an error{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Remote {
        code: Option<String>,
        message: String,
    },

    #[error("Request id {id} is already in flight")]
    DuplicateRequestId { id: u64 },

    #[error("Request id {id} is reserved for the session bootstrap")]
    ReservedRequestId { id: u64 },

    #[error("Subscription not found: {id}")]
    SubscriptionNotFound { id: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for any deadline failure (request, connect or close).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RequestTimeout { .. })
    }

    /// Returns `true` if the caller tried to use a session that is not up.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. } | Self::TransportClosed { .. })
    }

    /// Map a failure that happened while authenticating.
    ///
    /// Everything except a deadline becomes [`HandshakeFailed`](Self::HandshakeFailed).
    pub(crate) fn from_handshake(err: hassly_api::Error) -> Self {
        match err {
            hassly_api::Error::Timeout {
                operation,
                timeout_ms,
            } => Self::Timeout {
                operation,
                timeout_ms,
            },
            other => Self::HandshakeFailed {
                message: other.to_string(),
            },
        }
    }
}

impl From<hassly_api::Error> for CoreError {
    fn from(err: hassly_api::Error) -> Self {
        use hassly_api::Error as Api;

        match err {
            Api::InvalidAddress { url, reason } => Self::InvalidAddress { url, reason },
            Api::CertificateRead { path, source } => Self::CertificateRead { path, source },
            Api::Tls(message) => Self::HandshakeFailed {
                message: format!("TLS error: {message}"),
            },
            Api::AuthRejected { message } => Self::HandshakeFailed { message },
            e @ Api::UnexpectedHandshake { .. } => Self::HandshakeFailed {
                message: e.to_string(),
            },
            Api::Timeout {
                operation,
                timeout_ms,
            } => Self::Timeout {
                operation,
                timeout_ms,
            },
            Api::Transport(reason) => Self::ConnectionFailed {
                url: String::new(),
                reason,
            },
            e @ Api::Closed { .. } => Self::ConnectionFailed {
                url: String::new(),
                reason: e.to_string(),
            },
            Api::Decode { message, .. } => Self::Decode { message },
            Api::Encode(e) => Self::Internal(format!("failed to encode request: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_message_names_the_operation() {
        let err = CoreError::NotConnected { operation: "Fetch" };
        assert_eq!(err.to_string(), "Fetch error: not connected to Home Assistant");
        assert!(err.is_not_connected());
    }

    #[test]
    fn remote_error_message_with_and_without_code() {
        let err = CoreError::Remote {
            code: Some("not_found".into()),
            message: "Service not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Home Assistant returned an error (not_found): Service not found"
        );

        let err = CoreError::Remote {
            code: None,
            message: "Unknown error".into(),
        };
        assert_eq!(err.to_string(), "Home Assistant returned an error: Unknown error");
    }

    #[test]
    fn handshake_errors_keep_deadlines_distinct() {
        let err = CoreError::from_handshake(hassly_api::Error::Timeout {
            operation: "authentication",
            timeout_ms: 100,
        });
        assert!(err.is_timeout());

        let err = CoreError::from_handshake(hassly_api::Error::Decode {
            message: "expected value".into(),
            frame: "{{".into(),
        });
        assert!(matches!(err, CoreError::HandshakeFailed { .. }));
    }

    #[test]
    fn auth_rejection_maps_to_handshake_failed() {
        let err: CoreError = hassly_api::Error::AuthRejected {
            message: "Invalid password".into(),
        }
        .into();
        assert!(matches!(err, CoreError::HandshakeFailed { message } if message == "Invalid password"));
    }
}
