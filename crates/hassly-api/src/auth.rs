// Auth handshake over a freshly dialed socket.
//
// auth_required -> {"type":"auth","access_token":..} -> auth_ok | auth_invalid.
// Anything else during this window fails the handshake; the caller is
// responsible for dropping the half-open socket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::Message;

use crate::error::Error;
use crate::message::{self, AuthMessage, InboundMessage};
use crate::transport::{WsStream, millis};

/// Outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubHello {
    /// Hub version reported by `auth_ok` (or `auth_required` as a fallback).
    pub version: Option<String>,
}

/// Run the auth handshake, bounded by `timeout` as a whole.
pub async fn authenticate(
    ws: &mut WsStream,
    token: &SecretString,
    timeout: Duration,
) -> Result<HubHello, Error> {
    tokio::time::timeout(timeout, handshake(ws, token))
        .await
        .map_err(|_| Error::Timeout {
            operation: "authentication",
            timeout_ms: millis(timeout),
        })?
}

async fn handshake(ws: &mut WsStream, token: &SecretString) -> Result<HubHello, Error> {
    let challenge_version = match next_message(ws).await? {
        InboundMessage::AuthRequired { ha_version } => ha_version,
        other => {
            return Err(Error::UnexpectedHandshake {
                expected: "auth_required",
                got: other.kind().to_owned(),
            });
        }
    };
    tracing::debug!(version = ?challenge_version, "hub requested authentication");

    let auth = AuthMessage::new(token.expose_secret()).encode()?;
    ws.send(Message::text(auth)).await?;

    match next_message(ws).await? {
        InboundMessage::AuthOk { ha_version } => {
            let version = ha_version.or(challenge_version);
            tracing::info!(version = ?version, "authenticated with hub");
            Ok(HubHello { version })
        }
        InboundMessage::AuthInvalid { message } => Err(Error::AuthRejected {
            message: message.unwrap_or_else(|| "invalid access token".into()),
        }),
        other => Err(Error::UnexpectedHandshake {
            expected: "auth_ok",
            got: other.kind().to_owned(),
        }),
    }
}

/// Read the next text frame and decode it. Keepalive frames are skipped.
async fn next_message(ws: &mut WsStream) -> Result<InboundMessage, Error> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return message::decode(text.as_str()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                tracing::trace!("keepalive frame during handshake");
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((1005, String::new()));
                return Err(Error::Closed { code, reason });
            }
            Some(Ok(other)) => {
                return Err(Error::UnexpectedHandshake {
                    expected: "text frame",
                    got: format!("{other:?}").chars().take(64).collect(),
                });
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(Error::Closed {
                    code: 1006,
                    reason: "stream ended during handshake".into(),
                });
            }
        }
    }
}
