//! Shared helpers for command handlers.

use std::time::Duration;

use serde_json::Value;

use hassly_core::{ConnectionState, HubClient};

use crate::error::CliError;

/// Parse a `--params` / `--data` argument. Must be a JSON object.
pub fn parse_json_object(field: &str, raw: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid JSON: {e}"),
    })?;
    if !value.is_object() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(value)
}

/// Connect and wait until the registries are loaded and the event
/// subscription is live.
pub async fn connect_ready(client: &HubClient) -> Result<(), CliError> {
    client.connect().await?;
    let mut state = client.connection_state();

    // Four registries, then states/config/services: two round trips of the
    // response timeout at most.
    let deadline = client.config().response_timeout * 2;
    let ready = tokio::time::timeout(deadline, async {
        loop {
            match &*state.borrow_and_update() {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Disconnected | ConnectionState::Closing => {
                    return Err(CliError::NotConnected {
                        detail: "Connection closed while loading registries".into(),
                    });
                }
                _ => {}
            }
            if state.changed().await.is_err() {
                return Err(CliError::NotConnected {
                    detail: "Connection closed while loading registries".into(),
                });
            }
        }
    })
    .await;

    ready.unwrap_or_else(|_| {
        Err(CliError::Timeout {
            message: format!("Hub not ready after {}s", deadline.as_secs()),
        })
    })
}

/// Short, human-readable age of a timestamp.
pub fn since(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m", secs / 60),
        3600..86_400 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
