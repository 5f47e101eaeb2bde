use super::json_event::{find_event_arrays, looks_like_event, map_event_object, str_at};
use super::{looks_like_json, parse_json_document, EventExtractor};
use crate::common::constants::REST_JSON;
use crate::common::dates;
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;

const ENVELOPE_KEYS: &[&str] = &["events", "data", "items", "results"];
const VENUE_MARKER_KEYS: &[&str] = &["venue", "location", "place", "venue_name", "venueName", "address"];

/// Generic REST JSON: an array of event-shaped objects, top-level or under a common envelope key
pub struct RestJsonExtractor;

impl RestJsonExtractor {
    fn is_rest_event(item: &Value) -> bool {
        looks_like_event(item) && VENUE_MARKER_KEYS.iter().any(|k| item.get(*k).is_some_and(|v| !v.is_null()))
    }

    fn candidate_items(data: &Value) -> Vec<&Value> {
        let direct = match data {
            Value::Array(items) => Some(items),
            Value::Object(_) => ENVELOPE_KEYS.iter().find_map(|k| data.get(*k).and_then(Value::as_array)),
            _ => None,
        };
        if let Some(items) = direct {
            let matching: Vec<&Value> = items.iter().filter(|i| Self::is_rest_event(i)).collect();
            if !matching.is_empty() {
                return matching;
            }
        }
        find_event_arrays(data)
            .into_iter()
            .flat_map(|items| items.iter())
            .filter(|i| Self::is_rest_event(i))
            .collect()
    }
}

#[async_trait]
impl EventExtractor for RestJsonExtractor {
    fn identifier(&self) -> &'static str {
        REST_JSON
    }

    fn can_handle(&self, content: &str) -> bool {
        looks_like_json(content)
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        let Some(data) = parse_json_document(content) else {
            return Vec::new();
        };
        let feed_zone = str_at(&data, &["timezone", "timeZone", "time_zone"]).and_then(|z| dates::parse_timezone(&z));
        Self::candidate_items(&data)
            .into_iter()
            .filter_map(|item| map_event_object(item, feed_zone))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_enveloped_arrays() {
        let body = r#"{"timezone": "America/Denver", "results": [
            {"name": "Swing Dance", "starts_at": "2025-06-21T02:00:00Z", "location": "Grange Hall"},
            {"name": "No venue key", "starts_at": "2025-06-22T02:00:00Z"}
        ]}"#;
        let extractor = RestJsonExtractor;
        assert!(extractor.can_handle(body));
        let events = extractor.extract(body, "https://grange.example/api/events").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Swing Dance");
        assert_eq!(events[0].start_date.as_deref(), Some("2025-06-20"));
        assert_eq!(events[0].start_time.as_deref(), Some("20:00"));
        assert_eq!(events[0].venue_name.as_deref(), Some("Grange Hall"));
        assert_eq!(events[0].venue_timezone.as_deref(), Some("America/Denver"));
    }

    #[tokio::test]
    async fn non_event_json_yields_nothing() {
        let body = r#"{"status": "ok", "items": [{"id": 1, "label": "x"}]}"#;
        assert!(RestJsonExtractor.extract(body, "https://x.example/").await.is_empty());
        assert!(!RestJsonExtractor.can_handle("<html></html>"));
    }
}
