use super::json_event::{apply_address_text, fill, names_of, str_at, url_of};
use super::{looks_like_json, parse_json_document, EventExtractor};
use crate::common::constants::TRIBE_EVENTS;
use crate::common::dates;
use crate::common::text::{clean_optional, clean_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;

/// The Events Calendar (WordPress "Tribe") REST response: `{"events": [...], "total_pages": n}`
pub struct TribeEventsExtractor;

impl TribeEventsExtractor {
    fn map_item(item: &Value) -> Option<NormalizedEvent> {
        let title = str_at(item, &["title"]).map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
        let mut event = NormalizedEvent::new(title).with_raw(item.clone());

        // start_date is already local to `timezone`
        let zone = str_at(item, &["timezone"]).and_then(|z| dates::parse_timezone(&z));
        event.venue_timezone = zone.map(|tz| tz.name().to_string());
        let all_day = item.get("all_day").and_then(Value::as_bool).unwrap_or(false);
        if let Some(parts) = str_at(item, &["start_date"]).and_then(|d| dates::parse_datetime(&d, None)) {
            event.start_date = Some(parts.date_string());
            event.start_time = if all_day { None } else { parts.time_string() };
        }
        if let Some(parts) = str_at(item, &["end_date"]).and_then(|d| dates::parse_datetime(&d, None)) {
            event.end_date = Some(parts.date_string());
            event.end_time = if all_day { None } else { parts.time_string() };
        }

        event.description = str_at(item, &["description", "excerpt"]).and_then(|d| clean_optional(Some(&d)));

        // `venue` is an object, or an empty array when unset
        if let Some(venue) = item.get("venue").filter(|v| v.is_object()) {
            event.venue_name = str_at(venue, &["venue"]).map(|v| clean_text(&v));
            match str_at(venue, &["city"]) {
                Some(city) => {
                    fill(&mut event.venue_address, str_at(venue, &["address"]));
                    event.venue_city = Some(city);
                }
                None => {
                    if let Some(address) = str_at(venue, &["address"]) {
                        apply_address_text(&mut event, &address);
                    }
                }
            }
            fill(&mut event.venue_state, str_at(venue, &["stateprovince", "state", "province"]));
            fill(&mut event.venue_zip, str_at(venue, &["zip"]));
            fill(&mut event.venue_country, str_at(venue, &["country"]));
            if let (Some(lat), Some(lng)) = (str_at(venue, &["geo_lat"]), str_at(venue, &["geo_lng"])) {
                event.venue_coordinates = Some(format!("{},{}", lat, lng));
            }
            if event.venue_timezone.is_none() {
                event.venue_timezone = str_at(venue, &["timezone"])
                    .and_then(|z| dates::parse_timezone(&z))
                    .map(|tz| tz.name().to_string());
            }
        }

        event.organizer = item.get("organizer").and_then(|o| match o {
            Value::Array(items) => {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(|org| str_at(org, &["organizer"]))
                    .map(|n| clean_text(&n))
                    .collect();
                (!names.is_empty()).then(|| names.join(", "))
            }
            other => names_of(other),
        });
        event.price = str_at(item, &["cost"]).map(|c| clean_text(&c)).filter(|c| !c.is_empty());
        event.image_url = item.get("image").filter(|i| i.is_object()).and_then(url_of);
        event.ticket_url = str_at(item, &["website"])
            .filter(|w| !w.is_empty())
            .or_else(|| str_at(item, &["url"]));
        Some(event)
    }

    /// Shared with the WordPress endpoint discovery
    pub fn parse_response(content: &str) -> Vec<NormalizedEvent> {
        let Some(data) = parse_json_document(content) else {
            return Vec::new();
        };
        data.get("events")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Self::map_item).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventExtractor for TribeEventsExtractor {
    fn identifier(&self) -> &'static str {
        TRIBE_EVENTS
    }

    fn can_handle(&self, content: &str) -> bool {
        looks_like_json(content) && content.contains("\"events\"") && content.contains("\"start_date\"")
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        Self::parse_response(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIBE_RESPONSE: &str = r#"{
      "events": [
        {"id": 11, "title": "Trivia &#8211; Tuesday", "description": "<p>Teams of 6</p>",
         "url": "https://pub.example/event/trivia/", "website": "",
         "start_date": "2025-06-10 19:00:00", "end_date": "2025-06-10 21:00:00", "all_day": false,
         "timezone": "America/Chicago", "cost": "Free",
         "image": {"url": "https://pub.example/wp-content/uploads/trivia.jpg"},
         "venue": {"venue": "The Pub", "address": "300 Oak Ave", "city": "Chicago", "stateprovince": "IL", "zip": "60601", "country": "United States", "geo_lat": 41.88, "geo_lng": -87.63},
         "organizer": [{"organizer": "Quiz Co"}]},
        {"id": 12, "title": "Holiday Closure", "start_date": "2025-12-25 00:00:00", "all_day": true, "venue": [], "image": false}
      ],
      "total": 2, "total_pages": 1
    }"#;

    #[tokio::test]
    async fn maps_tribe_events() {
        let extractor = TribeEventsExtractor;
        assert!(extractor.can_handle(TRIBE_RESPONSE));
        let events = extractor.extract(TRIBE_RESPONSE, "https://pub.example/wp-json/tribe/events/v1/events").await;
        assert_eq!(events.len(), 2);

        let trivia = &events[0];
        assert_eq!(trivia.title, "Trivia \u{2013} Tuesday");
        assert_eq!(trivia.description.as_deref(), Some("Teams of 6"));
        assert_eq!(trivia.start_date.as_deref(), Some("2025-06-10"));
        assert_eq!(trivia.start_time.as_deref(), Some("19:00"));
        assert_eq!(trivia.venue_timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(trivia.venue_name.as_deref(), Some("The Pub"));
        assert_eq!(trivia.venue_address.as_deref(), Some("300 Oak Ave"));
        assert_eq!(trivia.venue_state.as_deref(), Some("IL"));
        assert_eq!(trivia.venue_coordinates.as_deref(), Some("41.88,-87.63"));
        assert_eq!(trivia.organizer.as_deref(), Some("Quiz Co"));
        assert_eq!(trivia.price.as_deref(), Some("Free"));
        assert_eq!(trivia.ticket_url.as_deref(), Some("https://pub.example/event/trivia/"));

        let closure = &events[1];
        assert_eq!(closure.start_time, None);
        assert_eq!(closure.venue_name, None);
        assert_eq!(closure.image_url, None);
    }

    #[tokio::test]
    async fn malformed_responses_yield_nothing() {
        let extractor = TribeEventsExtractor;
        let truncated = r#"{"events": [{"title": "Cut off", "start_date": "2025-06-10 19:00:00""#;
        assert!(extractor.extract(truncated, "https://pub.example/").await.is_empty());
        let wrong_shape = r#"{"events": {"title": "Not a list", "start_date": "2025-06-10"}}"#;
        assert!(extractor.extract(wrong_shape, "https://pub.example/").await.is_empty());
        let untitled = r#"{"events": [{"start_date": "2025-06-10 19:00:00"}, {"title": "  ", "start_date": "2025-06-11"}]}"#;
        assert!(extractor.extract(untitled, "https://pub.example/").await.is_empty());
    }
}
