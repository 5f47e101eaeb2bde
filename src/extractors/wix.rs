use super::json_event::{apply_venue_value, coordinates_of, fill, map_event_object, str_at, url_of};
use super::{looks_like_json, parse_json_document, EventExtractor};
use crate::common::constants::WIX_EVENTS;
use crate::common::dates;
use crate::common::text::clean_text;
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info};

/// Wix Events: the `wix-warmup-data` script on rendered pages, or the calendar
/// widget JSON (`events[]` / `eventsByDates{day: [...]}`) fetched directly.
pub struct WixEventsExtractor;

impl WixEventsExtractor {
    /// Every `appsWarmupData.<app>.widget*.events.events[]` array
    fn warmup_events(data: &Value) -> Vec<Value> {
        let mut out = Vec::new();
        let Some(apps) = data.get("appsWarmupData").and_then(Value::as_object) else {
            return out;
        };
        for app_data in apps.values() {
            let Some(widgets) = app_data.as_object() else {
                continue;
            };
            for (widget_key, widget_data) in widgets {
                if !widget_key.starts_with("widget") {
                    continue;
                }
                if let Some(events) = widget_data
                    .get("events")
                    .and_then(|e| e.get("events"))
                    .and_then(Value::as_array)
                {
                    debug!("wix: {} events under {}", events.len(), widget_key);
                    out.extend(events.iter().cloned());
                }
            }
        }
        out
    }

    /// Calendar JSON. Items under `eventsByDates` get the day key injected as `event_day`.
    fn calendar_events(data: &Value) -> Vec<Value> {
        if let Some(events) = data.get("events").and_then(Value::as_array) {
            return events.clone();
        }
        let mut out = Vec::new();
        if let Some(by_date) = data.get("eventsByDates").and_then(Value::as_object) {
            for (day, events) in by_date {
                for event in events.as_array().into_iter().flatten() {
                    let mut event = event.clone();
                    if let Some(obj) = event.as_object_mut() {
                        obj.insert("event_day".to_string(), Value::String(day.clone()));
                    }
                    out.push(event);
                }
            }
        }
        out
    }

    fn map_event(item: &Value) -> Option<NormalizedEvent> {
        let scheduling = item.pointer("/scheduling/config");
        let zone = scheduling
            .and_then(|s| str_at(s, &["timeZoneId", "timezone"]))
            .and_then(|z| dates::parse_timezone(&z));

        // Wix's own shape carries no top-level date key, so the generic mapper only
        // covers the calendar variant; the warmup fields are layered on top.
        let mut event = match map_event_object(item, zone) {
            Some(event) => event,
            None => {
                let title = str_at(item, &["title", "name"]).map(|t| clean_text(&t))?;
                let mut event = NormalizedEvent::new(title).with_raw(item.clone());
                event.description = str_at(item, &["description", "about"]).map(|d| clean_text(&d));
                event
            }
        };
        if event.title.is_empty() {
            return None;
        }

        if let Some(config) = scheduling {
            if let Some(parts) = config
                .get("startDate")
                .and_then(Value::as_str)
                .and_then(|s| dates::parse_datetime(s, zone))
            {
                event.start_date = Some(parts.date_string());
                event.start_time = parts.time_string();
            }
            if let Some(parts) = config
                .get("endDate")
                .and_then(Value::as_str)
                .and_then(|s| dates::parse_datetime(s, zone))
            {
                event.end_date = Some(parts.date_string());
                event.end_time = parts.time_string();
            }
            if let Some(tz) = zone {
                event.venue_timezone = Some(tz.name().to_string());
            }
        }

        // eventsByDates day key wins for the date, startDate still supplies the time
        if let Some(day) = item.get("event_day").and_then(Value::as_str) {
            if let Some(parts) = dates::parse_datetime(day, None) {
                event.start_date = Some(parts.date_string());
            }
        }

        if let Some(location) = item.get("location") {
            if let Some(full) = location.get("fullAddress") {
                let street = full.get("streetAddress").and_then(|s| {
                    let number = str_at(s, &["number"]).unwrap_or_default();
                    let name = str_at(s, &["name"])?;
                    Some(format!("{} {}", number, name).trim().to_string())
                });
                fill(&mut event.venue_address, street.or_else(|| str_at(full, &["formattedAddress"])));
                fill(&mut event.venue_city, str_at(full, &["city"]));
                fill(
                    &mut event.venue_state,
                    full.get("subdivisions")
                        .and_then(Value::as_array)
                        .and_then(|subs| subs.first())
                        .and_then(|s| str_at(s, &["code", "name"]))
                        .or_else(|| str_at(full, &["subdivision"])),
                );
                fill(&mut event.venue_zip, str_at(full, &["postalCode"]));
                fill(&mut event.venue_country, str_at(full, &["country"]));
                if event.venue_coordinates.is_none() {
                    event.venue_coordinates = full.get("geocode").and_then(coordinates_of);
                }
            }
            apply_venue_value(&mut event, location);
        }

        if event.image_url.is_none() {
            event.image_url = item.get("mainImage").and_then(url_of);
        }
        if event.ticket_url.is_none() {
            event.ticket_url = item
                .get("eventPageUrl")
                .and_then(|u| {
                    let base = str_at(u, &["base"])?;
                    let path = str_at(u, &["path"]).unwrap_or_default();
                    Some(format!("{}{}", base.trim_end_matches('/'), path))
                })
                .or_else(|| str_at(item, &["eventUrl"]));
        }
        Some(event)
    }

    fn map_all(items: &[Value]) -> Vec<NormalizedEvent> {
        items.iter().filter_map(Self::map_event).collect()
    }
}

#[async_trait]
impl EventExtractor for WixEventsExtractor {
    fn identifier(&self) -> &'static str {
        WIX_EVENTS
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains("wix-warmup-data")
            || (looks_like_json(content) && content.contains("\"eventsByDates\""))
            || (looks_like_json(content) && content.contains("\"scheduling\"") && content.contains("\"events\""))
    }

    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        if looks_like_json(content) {
            let Some(data) = parse_json_document(content) else {
                return Vec::new();
            };
            let events = Self::map_all(&Self::calendar_events(&data));
            info!("wix: {} calendar events from {}", events.len(), source_url);
            return events;
        }

        let document = Html::parse_document(content);
        let Ok(selector) = Selector::parse("script#wix-warmup-data") else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for script in document.select(&selector) {
            let body = script.text().collect::<String>();
            let Ok(data) = serde_json::from_str::<Value>(&body) else {
                debug!("wix: warmup data on {} is not valid JSON", source_url);
                continue;
            };
            events.extend(Self::map_all(&Self::warmup_events(&data)));
        }
        info!("wix: {} warmup events from {}", events.len(), source_url);
        events
    }
}
