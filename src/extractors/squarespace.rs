use super::json_event::{fill, str_at};
use super::{looks_like_json, parse_json_document, EventExtractor};
use crate::common::constants::SQUARESPACE;
use crate::common::dates;
use crate::common::text::{clean_optional, clean_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use chrono_tz::Tz;
use serde_json::Value;
use url::Url;

/// Squarespace events collection JSON (`?format=json`)
pub struct SquarespaceExtractor;

impl SquarespaceExtractor {
    fn map_item(item: &Value, zone: Option<Tz>, site_base: Option<&Url>) -> Option<NormalizedEvent> {
        let title = str_at(item, &["title"]).map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
        let mut event = NormalizedEvent::new(title).with_raw(item.clone());
        event.venue_timezone = zone.map(|tz| tz.name().to_string());

        if let Some(parts) = item
            .get("startDate")
            .and_then(Value::as_i64)
            .and_then(|ms| dates::from_epoch_millis(ms, zone))
        {
            event.start_date = Some(parts.date_string());
            event.start_time = parts.time_string();
        }
        if let Some(parts) = item
            .get("endDate")
            .and_then(Value::as_i64)
            .and_then(|ms| dates::from_epoch_millis(ms, zone))
        {
            event.end_date = Some(parts.date_string());
            event.end_time = parts.time_string();
        }

        event.description = item
            .get("excerpt")
            .or_else(|| item.get("body"))
            .and_then(Value::as_str)
            .and_then(|d| clean_optional(Some(d)));

        if let Some(location) = item.get("location") {
            fill(&mut event.venue_name, str_at(location, &["addressTitle"]));
            fill(&mut event.venue_address, str_at(location, &["addressLine1"]));
            // addressLine2 is "City, ST, 12345" or "City, ST 12345"
            if let Some(line2) = str_at(location, &["addressLine2"]) {
                let parts = crate::common::address::split_address(&format!("x, {}", line2));
                fill(&mut event.venue_city, parts.city);
                fill(&mut event.venue_state, parts.state);
                fill(&mut event.venue_zip, parts.zip);
            }
            fill(&mut event.venue_country, str_at(location, &["addressCountry"]));
            let lat = location.get("mapLat").and_then(Value::as_f64);
            let lng = location.get("mapLng").and_then(Value::as_f64);
            if let (Some(lat), Some(lng)) = (lat, lng) {
                if lat != 0.0 || lng != 0.0 {
                    event.venue_coordinates = Some(format!("{},{}", lat, lng));
                }
            }
        }

        event.image_url = str_at(item, &["assetUrl"]);
        event.ticket_url = str_at(item, &["fullUrl"]).map(|path| match site_base {
            Some(base) => base.join(&path).map(|u| u.to_string()).unwrap_or(path),
            None => path,
        });
        Some(event)
    }
}

#[async_trait]
impl EventExtractor for SquarespaceExtractor {
    fn identifier(&self) -> &'static str {
        SQUARESPACE
    }

    fn can_handle(&self, content: &str) -> bool {
        looks_like_json(content) && content.contains("\"upcoming\"")
    }

    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        let Some(data) = parse_json_document(content) else {
            return Vec::new();
        };
        let Some(items) = data.get("upcoming").and_then(Value::as_array) else {
            return Vec::new();
        };
        let zone = data
            .pointer("/website/timeZone")
            .and_then(Value::as_str)
            .and_then(dates::parse_timezone);
        let base = Url::parse(source_url).ok();
        items
            .iter()
            .filter_map(|item| Self::map_item(item, zone, base.as_ref()))
            .collect()
    }
}
