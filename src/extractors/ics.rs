//! iCalendar (RFC 5545) parsing for direct ICS responses and the feeds the
//! Google Calendar and `.ics` link extractors fetch.
//!
//! Recurrence rules are not expanded: a recurring VEVENT yields its first
//! occurrence only.

use super::json_event::apply_venue_value;
use super::EventExtractor;
use crate::common::constants::ICS;
use crate::common::dates::{self, DateTimeParts};
use crate::common::text::{clean_text, collapse_whitespace};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tracing::debug;

/// A content line split into name, parameters and value
#[derive(Debug, Clone, PartialEq)]
struct Property {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

impl Property {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Join folded lines (continuations start with a space or tab)
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        match line.strip_prefix([' ', '\t']) {
            Some(rest) if !lines.is_empty() => {
                if let Some(last) = lines.last_mut() {
                    last.push_str(rest);
                }
            }
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

fn parse_property(line: &str) -> Option<Property> {
    // The value starts at the first colon outside a quoted parameter
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    let split_at = split_at?;
    let (head, value) = (&line[..split_at], &line[split_at + 1..]);
    let mut segments = head.split(';');
    let name = segments.next()?.trim().to_uppercase();
    if name.is_empty() {
        return None;
    }
    let params = segments
        .filter_map(|seg| {
            let (k, v) = seg.split_once('=')?;
            Some((k.trim().to_uppercase(), v.trim().trim_matches('"').to_string()))
        })
        .collect();
    Some(Property {
        name,
        params,
        value: value.to_string(),
    })
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// DTSTART/DTEND: `VALUE=DATE` dates, UTC `Z` stamps converted into the zone,
/// TZID or floating local times kept as written.
fn parse_ics_datetime(prop: &Property, zone: Option<Tz>) -> Option<DateTimeParts> {
    let value = prop.value.trim();
    if prop.param("VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE")) || value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok().map(DateTimeParts::date_only);
    }
    if value.ends_with('Z') {
        return dates::parse_datetime(value, zone);
    }
    dates::parse_datetime(value, None)
}

fn props_to_json(props: &[Property]) -> Value {
    let mut map = Map::new();
    for prop in props {
        map.entry(prop.name.clone())
            .or_insert_with(|| Value::String(unescape(&prop.value)));
    }
    Value::Object(map)
}

fn map_vevent(props: &[Property], feed_zone: Option<Tz>) -> Option<NormalizedEvent> {
    let find = |name: &str| props.iter().find(|p| p.name == name);
    let text = |name: &str| {
        find(name)
            .map(|p| collapse_whitespace(&unescape(&p.value)))
            .filter(|v| !v.is_empty())
    };

    let title = text("SUMMARY").map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
    if find("STATUS").is_some_and(|s| s.value.trim().eq_ignore_ascii_case("CANCELLED")) {
        debug!("ics: skipping cancelled event {}", title);
        return None;
    }
    let mut event = NormalizedEvent::new(title).with_raw(props_to_json(props));

    let start = find("DTSTART");
    let zone = start
        .and_then(|p| p.param("TZID"))
        .and_then(dates::parse_timezone)
        .or(feed_zone);
    event.venue_timezone = zone.map(|tz| tz.name().to_string());

    if let Some(parts) = start.and_then(|p| parse_ics_datetime(p, zone)) {
        event.start_date = Some(parts.date_string());
        event.start_time = parts.time_string();
    }
    if let Some(parts) = find("DTEND").and_then(|p| parse_ics_datetime(p, zone)) {
        // All-day DTEND is exclusive
        let date = if parts.time.is_none() { parts.date.pred_opt().unwrap_or(parts.date) } else { parts.date };
        event.end_date = Some(dates::format_date(date));
        event.end_time = parts.time_string();
    }

    event.description = find("DESCRIPTION")
        .map(|p| clean_text(&unescape(&p.value)))
        .filter(|d| !d.is_empty());
    if let Some(location) = text("LOCATION") {
        apply_venue_value(&mut event, &Value::String(location));
    }
    if let Some(geo) = text("GEO") {
        if let Some((lat, lng)) = geo.split_once(';').or_else(|| geo.split_once(',')) {
            event.venue_coordinates = Some(format!("{},{}", lat.trim(), lng.trim()));
        }
    }
    event.organizer = find("ORGANIZER").and_then(|p| {
        p.param("CN")
            .map(|cn| cn.to_string())
            .or_else(|| p.value.strip_prefix("mailto:").map(|m| m.to_string()))
            .filter(|o| !o.is_empty())
    });
    event.ticket_url = text("URL");
    event.image_url = find("ATTACH")
        .filter(|p| p.param("FMTTYPE").map_or(true, |f| f.starts_with("image/")))
        .map(|p| p.value.trim().to_string())
        .filter(|v| v.starts_with("http"));
    Some(event)
}

/// Parse every VEVENT in an iCalendar document. `zone_hint` (a calendar embed's
/// display zone) wins over the calendar's own `X-WR-TIMEZONE`.
pub fn parse_calendar(text: &str, zone_hint: Option<Tz>) -> Vec<NormalizedEvent> {
    let lines = unfold(text);
    let calendar_zone = lines
        .iter()
        .filter_map(|l| parse_property(l))
        .find(|p| p.name == "X-WR-TIMEZONE")
        .and_then(|p| dates::parse_timezone(&p.value));
    let feed_zone = zone_hint.or(calendar_zone);

    let mut events = Vec::new();
    let mut current: Option<Vec<Property>> = None;
    let mut nested_depth = 0usize;
    for line in &lines {
        let Some(prop) = parse_property(line) else {
            continue;
        };
        let component = match prop.name.as_str() {
            "BEGIN" | "END" => Some((prop.name == "BEGIN", prop.value.trim().to_uppercase())),
            _ => None,
        };
        match component {
            Some((true, kind)) if kind == "VEVENT" => {
                current = Some(Vec::new());
                nested_depth = 0;
            }
            Some((false, kind)) if kind == "VEVENT" => {
                if let Some(props) = current.take() {
                    events.extend(map_vevent(&props, feed_zone));
                }
            }
            // VALARM and friends inside an event carry their own DESCRIPTION
            Some((true, _)) if current.is_some() => nested_depth += 1,
            Some((false, _)) if current.is_some() => nested_depth = nested_depth.saturating_sub(1),
            Some(_) => {}
            None => {
                if nested_depth == 0 {
                    if let Some(props) = current.as_mut() {
                        props.push(prop);
                    }
                }
            }
        }
    }
    events
}

/// A page or response that is itself an iCalendar document
pub struct IcsExtractor;

#[async_trait]
impl EventExtractor for IcsExtractor {
    fn identifier(&self) -> &'static str {
        ICS
    }

    fn can_handle(&self, content: &str) -> bool {
        content.trim_start_matches('\u{feff}').trim_start().starts_with("BEGIN:VCALENDAR")
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        parse_calendar(content, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
X-WR-TIMEZONE:America/Los_Angeles\r\n\
BEGIN:VEVENT\r\n\
UID:1@example\r\n\
DTSTART:20250614T030000Z\r\n\
DTEND:20250614T060000Z\r\n\
SUMMARY:Poetry Slam\\, Round 2\r\n\
DESCRIPTION:Sign-ups at 7.\\nBring\r\n  friends\r\n\
LOCATION:Hugo House\\, 1634 11th Ave\\, Seattle\\, WA 98122\r\n\
GEO:47.61;-122.32\r\n\
ORGANIZER;CN=\"Lit Crawl\":mailto:hi@example.org\r\n\
BEGIN:VALARM\r\n\
DESCRIPTION:Reminder\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20250620\r\n\
DTEND;VALUE=DATE:20250621\r\n\
SUMMARY:Solstice Fair\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;TZID=America/New_York:20250701T190000\r\n\
SUMMARY:East Coast Stream\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20250702T190000Z\r\n\
SUMMARY:Cancelled Thing\r\n\
STATUS:CANCELLED\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[tokio::test]
    async fn parses_vevents_with_zones_and_escapes() {
        let extractor = IcsExtractor;
        assert!(extractor.can_handle(FEED));
        let events = extractor.extract(FEED, "https://cal.example/feed.ics").await;
        assert_eq!(events.len(), 3);

        let slam = &events[0];
        assert_eq!(slam.title, "Poetry Slam, Round 2");
        assert_eq!(slam.start_date.as_deref(), Some("2025-06-13"));
        assert_eq!(slam.start_time.as_deref(), Some("20:00"));
        assert_eq!(slam.end_time.as_deref(), Some("23:00"));
        assert_eq!(slam.venue_timezone.as_deref(), Some("America/Los_Angeles"));
        assert_eq!(slam.description.as_deref(), Some("Sign-ups at 7. Bring friends"));
        assert_eq!(slam.venue_name.as_deref(), Some("Hugo House"));
        assert_eq!(slam.venue_address.as_deref(), Some("1634 11th Ave"));
        assert_eq!(slam.venue_city.as_deref(), Some("Seattle"));
        assert_eq!(slam.venue_coordinates.as_deref(), Some("47.61,-122.32"));
        assert_eq!(slam.organizer.as_deref(), Some("Lit Crawl"));

        let fair = &events[1];
        assert_eq!(fair.start_date.as_deref(), Some("2025-06-20"));
        assert_eq!(fair.start_time, None);
        assert_eq!(fair.end_date.as_deref(), Some("2025-06-20"));

        let stream = &events[2];
        assert_eq!(stream.start_time.as_deref(), Some("19:00"));
        assert_eq!(stream.venue_timezone.as_deref(), Some("America/New_York"));
    }

    #[test]
    fn zone_hint_overrides_calendar_zone() {
        let events = parse_calendar(FEED, dates::parse_timezone("America/Chicago"));
        assert_eq!(events[0].start_time.as_deref(), Some("22:00"));
    }

    #[test]
    fn bare_date_end_is_exclusive_like_value_date() {
        let feed = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20260701\nDTEND:20260703\nSUMMARY:Two Day Fest\nEND:VEVENT\nEND:VCALENDAR\n";
        let events = parse_calendar(feed, None);
        assert_eq!(events[0].start_date.as_deref(), Some("2026-07-01"));
        assert_eq!(events[0].start_time, None);
        assert_eq!(events[0].end_date.as_deref(), Some("2026-07-02"));
    }

    #[test]
    fn floating_times_without_any_zone_stay_blank() {
        let feed = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20250801T180000\nSUMMARY:Floating\nEND:VEVENT\nEND:VCALENDAR\n";
        let events = parse_calendar(feed, None);
        assert_eq!(events[0].start_time.as_deref(), Some("18:00"));
        assert_eq!(events[0].venue_timezone, None);
    }
}
