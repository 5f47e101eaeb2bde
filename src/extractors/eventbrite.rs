use super::json_event::{apply_venue_value, datetime_of, str_at, text_of, url_of};
use super::{json_after_marker, EventExtractor};
use crate::common::constants::EVENTBRITE;
use crate::common::dates;
use crate::common::text::{clean_optional, clean_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;

const SERVER_DATA_MARKER: &str = "window.__SERVER_DATA__";

/// Eventbrite organizer pages: `window.__SERVER_DATA__` carries the future events list
pub struct EventbriteExtractor;

impl EventbriteExtractor {
    fn future_events(data: &Value) -> Vec<&Value> {
        [
            "/view_data/events/future_events",
            "/view_data/events/events",
            "/events/future_events",
        ]
        .iter()
        .find_map(|p| data.pointer(p).and_then(Value::as_array))
        .map(|items| items.iter().collect())
        .unwrap_or_default()
    }

    fn map_item(item: &Value) -> Option<NormalizedEvent> {
        let title = item
            .get("name")
            .and_then(text_of)
            .or_else(|| str_at(item, &["title"]))
            .map(|t| clean_text(&t))
            .filter(|t| !t.is_empty())?;
        let mut event = NormalizedEvent::new(title).with_raw(item.clone());

        // start.local is already venue wall-clock; start.timezone names the zone
        let zone = item
            .pointer("/start/timezone")
            .and_then(Value::as_str)
            .and_then(dates::parse_timezone);
        event.venue_timezone = zone.map(|tz| tz.name().to_string());
        if let Some(parts) = item.get("start").and_then(|v| datetime_of(v, zone)) {
            event.start_date = Some(parts.date_string());
            event.start_time = parts.time_string();
        }
        if let Some(parts) = item.get("end").and_then(|v| datetime_of(v, zone)) {
            event.end_date = Some(parts.date_string());
            event.end_time = parts.time_string();
        }

        event.description = item
            .get("summary")
            .or_else(|| item.get("description"))
            .and_then(text_of)
            .and_then(|d| clean_optional(Some(&d)));

        if let Some(venue) = item.get("venue") {
            if let Some(name) = str_at(venue, &["name"]) {
                event.venue_name = Some(clean_text(&name));
            }
            if let Some(address) = venue.get("address") {
                event.venue_address = str_at(address, &["address_1"]);
                event.venue_city = str_at(address, &["city"]);
                event.venue_state = str_at(address, &["region"]);
                event.venue_zip = str_at(address, &["postal_code"]);
                event.venue_country = str_at(address, &["country"]);
                if let (Some(lat), Some(lng)) = (str_at(address, &["latitude"]), str_at(address, &["longitude"])) {
                    event.venue_coordinates = Some(format!("{},{}", lat, lng));
                }
            } else {
                apply_venue_value(&mut event, venue);
            }
        }

        event.ticket_url = str_at(item, &["url", "tickets_url"]);
        event.image_url = item.get("image").or_else(|| item.get("logo")).and_then(url_of);
        event.organizer = item.pointer("/organizer/name").and_then(text_of);

        if let Some(availability) = item.get("ticket_availability") {
            let is_free = availability.get("is_free").and_then(Value::as_bool).unwrap_or(false);
            let min = availability.pointer("/minimum_ticket_price/display").and_then(text_of);
            let max = availability.pointer("/maximum_ticket_price/display").and_then(text_of);
            event.price = match (is_free, min, max) {
                (true, _, _) => Some("Free".to_string()),
                (false, Some(min), Some(max)) if min != max => Some(format!("{} - {}", min, max)),
                (false, Some(min), _) => Some(min),
                (false, None, max) => max,
            };
        }
        Some(event)
    }
}

#[async_trait]
impl EventExtractor for EventbriteExtractor {
    fn identifier(&self) -> &'static str {
        EVENTBRITE
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains(SERVER_DATA_MARKER)
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        let Some(data) = json_after_marker(content, SERVER_DATA_MARKER) else {
            return Vec::new();
        };
        Self::future_events(&data)
            .into_iter()
            .filter_map(Self::map_item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><script>
window.__SERVER_DATA__ = {"view_data": {"events": {"future_events": [
  {"name": {"text": "Comedy Night"}, "summary": "Stand-up <em>showcase</em>",
   "start": {"timezone": "America/Denver", "local": "2025-07-04T19:30:00", "utc": "2025-07-05T01:30:00Z"},
   "end": {"timezone": "America/Denver", "local": "2025-07-04T22:00:00", "utc": "2025-07-05T04:00:00Z"},
   "url": "https://www.eventbrite.com/e/comedy-night-123",
   "logo": {"url": "https://img.evbuc.com/logo.jpg"},
   "venue": {"name": "Laugh Lab", "address": {"address_1": "1 Pine St", "city": "Denver", "region": "CO", "postal_code": "80202", "country": "US", "latitude": "39.75", "longitude": "-104.99"}},
   "ticket_availability": {"is_free": false, "minimum_ticket_price": {"display": "$10.00"}, "maximum_ticket_price": {"display": "$25.00"}}},
  {"name": {"text": "Free Workshop"}, "start": {"local": "2025-07-06T10:00:00"}, "ticket_availability": {"is_free": true}}
]}}};
window.__REACT_QUERY_STATE__ = {};
</script></body></html>"#;

    #[tokio::test]
    async fn reads_future_events_from_server_data() {
        let extractor = EventbriteExtractor;
        assert!(extractor.can_handle(PAGE));
        let events = extractor.extract(PAGE, "https://www.eventbrite.com/o/lab-1").await;
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.title, "Comedy Night");
        assert_eq!(first.description.as_deref(), Some("Stand-up showcase"));
        assert_eq!(first.start_date.as_deref(), Some("2025-07-04"));
        assert_eq!(first.start_time.as_deref(), Some("19:30"));
        assert_eq!(first.end_time.as_deref(), Some("22:00"));
        assert_eq!(first.venue_timezone.as_deref(), Some("America/Denver"));
        assert_eq!(first.venue_city.as_deref(), Some("Denver"));
        assert_eq!(first.venue_coordinates.as_deref(), Some("39.75,-104.99"));
        assert_eq!(first.price.as_deref(), Some("$10.00 - $25.00"));
        assert_eq!(first.image_url.as_deref(), Some("https://img.evbuc.com/logo.jpg"));

        assert_eq!(events[1].price.as_deref(), Some("Free"));
        assert_eq!(events[1].venue_timezone, None);
    }

    #[tokio::test]
    async fn truncated_blob_yields_nothing() {
        let page = "<script>window.__SERVER_DATA__ = {\"view_data\": {\"events\":</script>";
        assert!(EventbriteExtractor.extract(page, "https://x.example/").await.is_empty());
    }
}
