use super::json_event::{apply_venue_value, fill, str_at, text_of, url_of};
use super::{looks_like_json, parse_json_document, EventExtractor};
use crate::common::constants::DICE;
use crate::common::dates;
use crate::common::text::{clean_optional, clean_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;

/// DICE partner API / widget JSON (`{"data": [...]}`)
pub struct DiceExtractor;

impl DiceExtractor {
    /// Lineup entries are performers except the "Doors open" pseudo-entries DICE
    /// mixes in; those carry the time instead.
    fn lineup(item: &Value) -> (Option<String>, Option<String>) {
        let mut names = Vec::new();
        let mut doors = None;
        for entry in item.get("lineup").and_then(Value::as_array).into_iter().flatten() {
            let Some(details) = entry.get("details").and_then(text_of).map(|d| clean_text(&d)) else {
                continue;
            };
            if details.to_lowercase().starts_with("doors") {
                doors = entry.get("time").and_then(text_of);
                continue;
            }
            if !details.is_empty() {
                names.push(details);
            }
        }
        let performer = (!names.is_empty()).then(|| names.join(", "));
        (performer, doors)
    }

    fn price(item: &Value) -> Option<String> {
        let currency = str_at(item, &["currency"]).unwrap_or_default();
        let symbol = match currency.to_uppercase().as_str() {
            "USD" | "CAD" | "AUD" => "$",
            "GBP" => "£",
            "EUR" => "€",
            _ => "",
        };
        match item.get("price")? {
            // minor units
            Value::Number(n) => {
                let cents = n.as_f64()?;
                if cents == 0.0 {
                    Some("Free".to_string())
                } else {
                    Some(format!("{}{:.2}", symbol, cents / 100.0))
                }
            }
            other => text_of(other),
        }
    }

    fn map_item(item: &Value) -> Option<NormalizedEvent> {
        let title = str_at(item, &["name", "title"]).map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
        let mut event = NormalizedEvent::new(title).with_raw(item.clone());

        let zone = str_at(item, &["timezone"]).and_then(|z| dates::parse_timezone(&z));
        event.venue_timezone = zone.map(|tz| tz.name().to_string());
        if let Some(parts) = str_at(item, &["date"]).and_then(|d| dates::parse_datetime(&d, zone)) {
            event.start_date = Some(parts.date_string());
            event.start_time = parts.time_string();
        }
        if let Some(parts) = str_at(item, &["date_end"]).and_then(|d| dates::parse_datetime(&d, zone)) {
            event.end_date = Some(parts.date_string());
            event.end_time = parts.time_string();
        }

        let (performer, doors) = Self::lineup(item);
        event.performer = performer;
        if event.start_time.is_none() {
            event.start_time = doors
                .and_then(|t| dates::parse_time_text(&t))
                .map(dates::format_time);
        }

        event.description = str_at(item, &["description", "raw_description"]).and_then(|d| clean_optional(Some(&d)));
        if let Some(venue) = item.get("venue") {
            apply_venue_value(&mut event, venue);
        }
        if let Some(location) = item.get("location") {
            fill(&mut event.venue_address, str_at(location, &["street"]));
            fill(&mut event.venue_city, str_at(location, &["city"]));
            fill(&mut event.venue_state, str_at(location, &["state", "region"]));
            fill(&mut event.venue_zip, str_at(location, &["zip"]));
            fill(&mut event.venue_country, str_at(location, &["country"]));
            if let (Some(lat), Some(lng)) = (str_at(location, &["lat"]), str_at(location, &["lng"])) {
                event.venue_coordinates = Some(format!("{},{}", lat, lng));
            }
        }

        event.image_url = item
            .get("event_images")
            .and_then(|images| ["landscape", "square", "portrait"].iter().find_map(|k| images.get(*k).and_then(url_of)))
            .or_else(|| item.get("images").and_then(url_of));
        event.ticket_url = str_at(item, &["url", "link"]);
        event.price = Self::price(item);
        event.organizer = str_at(item, &["promoter"]);
        Some(event)
    }
}

#[async_trait]
impl EventExtractor for DiceExtractor {
    fn identifier(&self) -> &'static str {
        DICE
    }

    fn can_handle(&self, content: &str) -> bool {
        looks_like_json(content)
            && content.contains("\"data\"")
            && (content.contains("dice.fm") || content.contains("\"event_images\"") || content.contains("\"date_end\""))
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        let Some(data) = parse_json_document(content) else {
            return Vec::new();
        };
        data.get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Self::map_item).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{"data": [
      {"name": "Basement Rave", "date": "2025-08-09T21:00:00Z", "date_end": "2025-08-10T03:00:00Z",
       "timezone": "Europe/London", "venue": "The Cellar", "currency": "GBP", "price": 1250,
       "location": {"street": "5 Dock Rd", "city": "London", "zip": "E1 1AA", "country": "GB", "lat": 51.5, "lng": -0.07},
       "lineup": [{"details": "Doors open", "time": "10:00 PM"}, {"details": "DJ Mole"}, {"details": "Sister Bass"}],
       "event_images": {"square": "https://dice-media.imgix.net/sq.jpg", "landscape": "https://dice-media.imgix.net/ls.jpg"},
       "url": "https://link.dice.fm/abc"}
    ]}"#;

    #[tokio::test]
    async fn maps_dice_items() {
        let extractor = DiceExtractor;
        assert!(extractor.can_handle(FEED));
        let events = extractor.extract(FEED, "https://partners-endpoint.dice.fm/api/v2/events").await;
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.title, "Basement Rave");
        // BST is UTC+1
        assert_eq!(event.start_date.as_deref(), Some("2025-08-09"));
        assert_eq!(event.start_time.as_deref(), Some("22:00"));
        assert_eq!(event.end_date.as_deref(), Some("2025-08-10"));
        assert_eq!(event.end_time.as_deref(), Some("04:00"));
        assert_eq!(event.venue_timezone.as_deref(), Some("Europe/London"));
        assert_eq!(event.venue_name.as_deref(), Some("The Cellar"));
        assert_eq!(event.venue_city.as_deref(), Some("London"));
        assert_eq!(event.performer.as_deref(), Some("DJ Mole, Sister Bass"));
        assert_eq!(event.price.as_deref(), Some("£12.50"));
        assert_eq!(event.image_url.as_deref(), Some("https://dice-media.imgix.net/ls.jpg"));
        assert_eq!(event.venue_coordinates.as_deref(), Some("51.5,-0.07"));
    }

    #[test]
    fn ignores_unrelated_data_envelopes() {
        assert!(!DiceExtractor.can_handle(r#"{"data": [{"id": 1}]}"#));
    }
}
