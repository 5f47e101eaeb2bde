use super::json_event::{fill, names_of, str_at, url_of};
use super::{looks_like_json, parse_json_document, EventExtractor};
use crate::common::constants::BANDSINTOWN;
use crate::common::dates;
use crate::common::text::{clean_optional, clean_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;

/// Bandsintown artist events API: a top-level array of events with `datetime` and `lineup`
pub struct BandsintownExtractor;

impl BandsintownExtractor {
    fn map_item(item: &Value) -> Option<NormalizedEvent> {
        let performer = item.get("lineup").and_then(names_of).or_else(|| item.pointer("/artist/name").and_then(names_of));
        // Bandsintown titles are often blank; the lineup stands in
        let title = str_at(item, &["title"])
            .map(|t| clean_text(&t))
            .filter(|t| !t.is_empty())
            .or_else(|| performer.clone())?;
        let mut event = NormalizedEvent::new(title).with_raw(item.clone());
        event.performer = performer;

        let venue = item.get("venue");
        let zone = venue
            .and_then(|v| str_at(v, &["timezone"]))
            .and_then(|z| dates::parse_timezone(&z));
        event.venue_timezone = zone.map(|tz| tz.name().to_string());

        // `datetime` is venue-local without an offset
        if let Some(parts) = str_at(item, &["datetime", "starts_at"]).and_then(|d| dates::parse_datetime(&d, zone)) {
            event.start_date = Some(parts.date_string());
            event.start_time = parts.time_string();
        }
        if let Some(parts) = str_at(item, &["ends_at"]).and_then(|d| dates::parse_datetime(&d, zone)) {
            event.end_date = Some(parts.date_string());
            event.end_time = parts.time_string();
        }
        event.description = str_at(item, &["description"]).and_then(|d| clean_optional(Some(&d)));

        if let Some(venue) = venue {
            event.venue_name = str_at(venue, &["name"]).map(|n| clean_text(&n));
            fill(&mut event.venue_address, str_at(venue, &["street_address"]));
            fill(&mut event.venue_city, str_at(venue, &["city"]));
            fill(&mut event.venue_state, str_at(venue, &["region"]));
            fill(&mut event.venue_zip, str_at(venue, &["postal_code"]));
            fill(&mut event.venue_country, str_at(venue, &["country"]));
            if let (Some(lat), Some(lng)) = (str_at(venue, &["latitude"]), str_at(venue, &["longitude"])) {
                event.venue_coordinates = Some(format!("{},{}", lat, lng));
            }
        }

        event.ticket_url = item
            .get("offers")
            .and_then(Value::as_array)
            .and_then(|offers| offers.iter().find_map(|o| str_at(o, &["url"])))
            .or_else(|| str_at(item, &["url"]));
        event.image_url = item.pointer("/artist/image_url").and_then(url_of);
        Some(event)
    }
}

#[async_trait]
impl EventExtractor for BandsintownExtractor {
    fn identifier(&self) -> &'static str {
        BANDSINTOWN
    }

    fn can_handle(&self, content: &str) -> bool {
        content.trim_start_matches('\u{feff}').trim_start().starts_with('[')
            && content.contains("\"datetime\"")
            && content.contains("\"lineup\"")
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        if !looks_like_json(content) {
            return Vec::new();
        }
        match parse_json_document(content) {
            Some(Value::Array(items)) => items.iter().filter_map(Self::map_item).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_artist_events_with_lineup_title_fallback() {
        let body = r#"[
          {"id": "1", "datetime": "2025-09-12T19:00:00", "title": "",
           "venue": {"name": "Crocodile", "city": "Seattle", "region": "WA", "country": "United States", "latitude": "47.61", "longitude": "-122.34"},
           "lineup": ["The Moles", "Guest"],
           "offers": [{"type": "Tickets", "url": "https://www.bandsintown.com/t/1", "status": "available"}],
           "url": "https://www.bandsintown.com/e/1"}
        ]"#;
        let extractor = BandsintownExtractor;
        assert!(extractor.can_handle(body));
        let events = extractor.extract(body, "https://rest.bandsintown.com/artists/x/events").await;
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.title, "The Moles, Guest");
        assert_eq!(event.performer.as_deref(), Some("The Moles, Guest"));
        assert_eq!(event.start_date.as_deref(), Some("2025-09-12"));
        assert_eq!(event.start_time.as_deref(), Some("19:00"));
        assert_eq!(event.venue_name.as_deref(), Some("Crocodile"));
        assert_eq!(event.venue_state.as_deref(), Some("WA"));
        assert_eq!(event.venue_timezone, None);
        assert_eq!(event.ticket_url.as_deref(), Some("https://www.bandsintown.com/t/1"));
    }

    #[test]
    fn needs_a_top_level_array() {
        assert!(!BandsintownExtractor.can_handle(r#"{"datetime": "x", "lineup": []}"#));
    }
}
