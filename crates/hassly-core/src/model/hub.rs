// ── Hub-wide snapshots and service calls ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of `get_config`. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub unit_system: Option<Value>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of `get_services`: domain -> service name -> description.
pub type Services = BTreeMap<String, BTreeMap<String, Value>>;

/// A `call_service` request.
///
/// ```
/// use hassly_core::ServiceCall;
///
/// let call = ServiceCall::new("light", "turn_on")
///     .entity("light.kitchen")
///     .data(serde_json::json!({ "brightness": 120 }));
/// assert_eq!(call.domain, "light");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    /// Optional when `service_data` already carries the target.
    pub entity_id: Option<String>,
    pub service_data: Option<Value>,
    pub return_response: bool,
}

impl ServiceCall {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            entity_id: None,
            service_data: None,
            return_response: false,
        }
    }

    #[must_use]
    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.service_data = Some(data);
        self
    }

    /// Ask the hub to include the service's response payload.
    #[must_use]
    pub fn return_response(mut self, enabled: bool) -> Self {
        self.return_response = enabled;
        self
    }
}

/// `{context, response?}` returned by a successful service call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
}
