//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use hassly_config::ConfigError;
use hassly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to Home Assistant at {url}")]
    #[diagnostic(
        code(hassly::connection_failed),
        help(
            "Check that Home Assistant is running and reachable.\n\
             URL: {url}\n\
             For self-signed certificates try: hassly --insecure ..."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{detail}")]
    #[diagnostic(
        code(hassly::not_connected),
        help("The connection dropped before the command finished. Run it again.")
    )]
    NotConnected { detail: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(hassly::auth_failed),
        help(
            "Create a long-lived access token under your Home Assistant user profile,\n\
             then store it with: hassly config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(hassly::no_credentials),
        help(
            "Store one with: hassly config set-token --profile {profile}\n\
             Or set the HASSLY_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Hub ──────────────────────────────────────────────────────────

    #[error("Home Assistant error ({code}): {message}")]
    #[diagnostic(code(hassly::remote_error))]
    Remote { code: String, message: String },

    #[error("Subscription {id} not found")]
    #[diagnostic(code(hassly::not_found))]
    SubscriptionNotFound { id: u64 },

    #[error("Unexpected response: {message}")]
    #[diagnostic(code(hassly::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hassly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hassly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Config file: {path}"
        )
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("No hub configured")]
    #[diagnostic(
        code(hassly::no_config),
        help(
            "Pass --url and --token, set HASSLY_URL and HASSLY_TOKEN,\n\
             or add a profile to: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(hassly::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(hassly::timeout),
        help("Increase the timeout with --timeout or check hub responsiveness.")
    )]
    Timeout { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(hassly::json), help("Check the JSON argument and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::SubscriptionNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAddress { url, reason } => CliError::Validation {
                field: "url".into(),
                reason: format!("{url}: {reason}"),
            },

            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            e @ CoreError::CertificateRead { .. } => CliError::ConnectionFailed {
                url: String::new(),
                source: Box::new(e),
            },

            CoreError::HandshakeFailed { message } => CliError::AuthFailed { message },

            e @ (CoreError::NotConnected { .. } | CoreError::TransportClosed { .. }) => {
                CliError::NotConnected {
                    detail: e.to_string(),
                }
            }

            e @ (CoreError::Timeout { .. } | CoreError::RequestTimeout { .. }) => {
                CliError::Timeout {
                    message: e.to_string(),
                }
            }

            CoreError::Remote { code, message } => CliError::Remote {
                code: code.unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::SubscriptionNotFound { id } => CliError::SubscriptionNotFound { id },

            e @ CoreError::ReservedRequestId { .. } => CliError::Validation {
                field: "id".into(),
                reason: e.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            e @ (CoreError::AlreadyConnected
            | CoreError::DuplicateRequestId { .. }
            | CoreError::Decode { .. }
            | CoreError::Internal(_)) => CliError::Protocol {
                message: e.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
