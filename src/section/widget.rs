//! Calendar widgets that ship their event list as a base64 JSON attribute
//! (`data-calendar-events`, `data-events-payload`).

use crate::extractors::json_event::{datetime_of, str_at, value_at, START_KEYS, TITLE_KEYS};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

pub const PAYLOAD_ATTRIBUTES: &[&str] = &["data-calendar-events", "data-events-payload"];

/// Decode a base64 JSON attribute value. Padding and alphabet vary by widget.
pub fn decode_payload(encoded: &str) -> Option<Value> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let bytes = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(compact.as_bytes()).ok())?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("widget payload is not JSON: {}", e);
            None
        }
    }
}

/// Events of a decoded payload (`[...]` or `{"events": [...]}`), minus "closed"
/// placeholders and anything dated before `today`
pub fn upcoming_events(payload: &Value, today: NaiveDate) -> Vec<Value> {
    let items: &[Value] = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => payload
            .get("events")
            .or_else(|| payload.get("data"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .filter(|item| {
            !str_at(item, TITLE_KEYS).is_some_and(|t| t.trim().eq_ignore_ascii_case("closed"))
        })
        .filter(|item| {
            value_at(item, START_KEYS)
                .and_then(|v| datetime_of(v, None))
                .map_or(true, |parts| parts.date >= today)
        })
        .cloned()
        .collect()
}

/// Convenience for the finder: decode then filter
pub fn decode_events(encoded: &str, today: NaiveDate) -> Vec<Value> {
    decode_payload(encoded)
        .map(|payload| upcoming_events(&payload, today))
        .unwrap_or_default()
}
