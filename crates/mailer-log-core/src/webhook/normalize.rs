//! Event normalization
//!
//! Maps the provider's event vocabulary onto [`EventType`] names and keeps a
//! fixed allow-list of the nested diagnostic groups as a flat payload.

use super::WebhookError;
use chrono::{DateTime, Utc};
use mailer_log_common::types::EmailId;
use mailer_log_common::EventType;
use mailer_log_storage::models::CreateEvent;
use serde_json::{Map, Value};
use std::borrow::Cow;

const CLIENT_INFO_FIELDS: &[&str] = &[
    "client-name",
    "client-os",
    "client-type",
    "device-type",
    "user-agent",
    "bot",
];
const GEOLOCATION_FIELDS: &[&str] = &["country", "region", "city"];
const DELIVERY_STATUS_FIELDS: &[&str] = &[
    "code",
    "message",
    "description",
    "mx-host",
    "attempt-no",
    "tls",
    "certificate-verified",
    "utf8",
    "session-seconds",
    "enhanced-code",
];
const ENVELOPE_FIELDS: &[&str] = &["sender", "targets", "transport", "sending-ip"];
const FLAG_FIELDS: &[&str] = &["is-routed", "is-authenticated", "is-system-test", "is-test-mode"];

const GROUPS: &[(&str, &[&str])] = &[
    ("client-info", CLIENT_INFO_FIELDS),
    ("geolocation", GEOLOCATION_FIELDS),
    ("delivery-status", DELIVERY_STATUS_FIELDS),
    ("envelope", ENVELOPE_FIELDS),
    ("flags", FLAG_FIELDS),
];
const SCALARS: &[&str] = &["severity", "reason", "log-level"];
const LISTS: &[&str] = &["tags", "campaigns"];

/// Canonical form of one provider event
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub provider_event_id: Option<String>,
    /// Event name after vocabulary mapping; may still be outside [`EventType`]
    pub event: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub recipient: Option<String>,
    pub ip_address: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub client_name: Option<String>,
    pub client_os: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    /// Allow-listed diagnostic groups, snake_case keys
    pub payload: Value,
}

impl NormalizedEvent {
    /// Known event type, `None` for names outside the fixed enumeration
    pub fn event_type(&self) -> Option<EventType> {
        self.event.parse().ok()
    }

    /// Build the storage input for `email_id`.
    ///
    /// A missing provider timestamp falls back to `received_at`.
    pub fn into_create_event(
        self,
        email_id: EmailId,
        event_type: EventType,
        received_at: DateTime<Utc>,
    ) -> CreateEvent {
        CreateEvent {
            email_id,
            event_type,
            provider_event_id: self.provider_event_id,
            occurred_at: self.occurred_at.unwrap_or(received_at),
            recipient: self.recipient,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            device_type: self.device_type,
            client_name: self.client_name,
            client_os: self.client_os,
            country: self.country,
            region: self.region,
            city: self.city,
            url: self.url,
            raw_payload: self.payload,
        }
    }
}

/// The event object of a webhook document.
///
/// Uses `event-data` when present, otherwise the document itself without
/// its `signature` block.
pub fn event_data(document: &Value) -> Cow<'_, Value> {
    match document.get("event-data") {
        Some(data) if data.is_object() => Cow::Borrowed(data),
        _ => {
            let mut data = document.clone();
            if let Some(map) = data.as_object_mut() {
                map.remove("signature");
            }
            Cow::Owned(data)
        }
    }
}

/// Provider event id (`id`) of an event object
pub fn provider_event_id(event_data: &Value) -> Option<String> {
    text(event_data.get("id"))
}

/// Map provider failure names onto internal event names
pub fn normalize_event_name(name: &str) -> &str {
    match name {
        "permanent_fail" => "bounced",
        "temporary_fail" => "failed",
        other => other,
    }
}

/// Normalize an event object.
///
/// Only a missing `event` name is an error; every other field is optional.
pub fn normalize(event_data: &Value) -> Result<NormalizedEvent, WebhookError> {
    let event = text(event_data.get("event")).ok_or(WebhookError::MissingEventType)?;

    let client_info = event_data.get("client-info");
    let geolocation = event_data.get("geolocation");

    Ok(NormalizedEvent {
        provider_event_id: provider_event_id(event_data),
        event: normalize_event_name(&event).to_string(),
        occurred_at: event_data.get("timestamp").and_then(epoch_seconds),
        recipient: text(event_data.get("recipient")),
        ip_address: text(event_data.get("ip")),
        url: text(event_data.get("url")),
        user_agent: text(client_info.and_then(|c| c.get("user-agent"))),
        device_type: text(client_info.and_then(|c| c.get("device-type"))),
        client_name: text(client_info.and_then(|c| c.get("client-name"))),
        client_os: text(client_info.and_then(|c| c.get("client-os"))),
        country: text(geolocation.and_then(|g| g.get("country"))),
        region: text(geolocation.and_then(|g| g.get("region"))),
        city: text(geolocation.and_then(|g| g.get("city"))),
        payload: Value::Object(payload(event_data)),
    })
}

fn payload(event_data: &Value) -> Map<String, Value> {
    let mut payload = Map::new();

    for (group, fields) in GROUPS {
        let Some(Value::Object(source)) = event_data.get(*group) else {
            continue;
        };
        let mut kept = Map::new();
        for field in *fields {
            if let Some(value) = source.get(*field).filter(|v| is_present(v)) {
                kept.insert(snake_case(field), value.clone());
            }
        }
        if !kept.is_empty() {
            payload.insert(snake_case(group), Value::Object(kept));
        }
    }

    for key in SCALARS.iter().chain(LISTS) {
        if let Some(value) = event_data.get(*key).filter(|v| is_present(v)) {
            payload.insert(snake_case(key), value.clone());
        }
    }

    payload
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn snake_case(key: &str) -> String {
    key.replace('-', "_")
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Fractional seconds since the epoch, as number or numeric string
fn epoch_seconds(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
