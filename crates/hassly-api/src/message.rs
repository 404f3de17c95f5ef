//! Message codec for the hub's WebSocket protocol.
//!
//! Every frame is a UTF-8 text frame carrying exactly one JSON object.
//! Outbound traffic is either the [`AuthMessage`] sent during the handshake
//! or a [`CommandFrame`] (`{"type": <command>, "id": <id>, ...params}`).
//! Inbound frames decode into [`InboundMessage`]; malformed payloads never
//! panic and surface as [`Error::Decode`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Outbound ─────────────────────────────────────────────────────────

/// Credentials sent in reply to `auth_required`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    access_token: &'a str,
}

impl<'a> AuthMessage<'a> {
    pub fn new(access_token: &'a str) -> Self {
        Self {
            kind: "auth",
            access_token,
        }
    }

    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A correlated command: `{"type": <command>, "id": <id>, ...params}`.
///
/// Params are flattened into the top-level object, which is how every
/// hub command (`get_states`, `call_service`, registry lists, ...) is shaped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandFrame {
    #[serde(rename = "type")]
    pub command: String,
    pub id: u64,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl CommandFrame {
    pub fn new(command: impl Into<String>, id: u64) -> Self {
        Self {
            command: command.into(),
            id,
            params: Map::new(),
        }
    }

    /// Merge a params object into the frame.
    ///
    /// Non-object values are ignored with a debug log; `type` and `id`
    /// are owned by the frame and never overwritten.
    pub fn with_params(mut self, params: Value) -> Self {
        match params {
            Value::Object(map) => {
                for (key, value) in map {
                    if key == "type" || key == "id" {
                        continue;
                    }
                    self.params.insert(key, value);
                }
            }
            Value::Null => {}
            other => {
                tracing::debug!(command = %self.command, params = %other, "ignoring non-object params");
            }
        }
        self
    }

    /// Insert one parameter.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_owned(), value.into());
        self
    }

    pub fn ping(id: u64) -> Self {
        Self::new("ping", id)
    }

    pub fn subscribe_events(id: u64, event_type: Option<&str>) -> Self {
        let frame = Self::new("subscribe_events", id);
        match event_type {
            Some(event_type) => frame.param("event_type", event_type),
            None => frame,
        }
    }

    pub fn unsubscribe_events(id: u64, subscription: u64) -> Self {
        Self::new("unsubscribe_events", id).param("subscription", subscription)
    }

    /// `call_service` frame. `target` is only emitted when an entity id is
    /// given, since `service_data` may already carry the target.
    pub fn call_service(
        id: u64,
        domain: &str,
        service: &str,
        entity_id: Option<&str>,
        service_data: Option<Value>,
        return_response: bool,
    ) -> Self {
        let mut frame = Self::new("call_service", id)
            .param("domain", domain)
            .param("service", service);
        if let Some(entity_id) = entity_id {
            frame = frame.param("target", serde_json::json!({ "entity_id": entity_id }));
        }
        if let Some(data) = service_data {
            frame = frame.param("service_data", data);
        }
        if return_response {
            frame = frame.param("return_response", true);
        }
        frame
    }

    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result(ResultMessage),
    Event {
        id: u64,
        #[serde(default)]
        event: Option<HubEvent>,
    },
    Pong {
        id: u64,
    },
    /// Any message type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Short name used in logs and handshake errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthOk { .. } => "auth_ok",
            Self::AuthInvalid { .. } => "auth_invalid",
            Self::Result(_) => "result",
            Self::Event { .. } => "event",
            Self::Pong { .. } => "pong",
            Self::Unknown => "unknown",
        }
    }
}

/// `{"type":"result","id":..,"success":..,"result"|"error":..}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultMessage {
    pub id: u64,
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

/// Error body the hub attaches to an unsuccessful result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of an `event` frame.
///
/// `data` is kept as raw JSON; the event router decodes it per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub time_fired: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<InboundMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::Decode {
        message: e.to_string(),
        frame: text.chars().take(512).collect(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
