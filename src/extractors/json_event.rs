//! Key-guessing mapper from loosely shaped JSON event objects to `NormalizedEvent`.
//!
//! Used by the extractors whose feeds vary between sites (`next_data`, `rest_json`)
//! and as a fallback for fields the platform extractors don't map themselves.

use crate::common::address::split_address;
use crate::common::dates::{self, DateTimeParts};
use crate::common::text::{clean_optional, clean_text, collapse_whitespace};
use crate::common::types::NormalizedEvent;
use chrono::NaiveTime;
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const TITLE_KEYS: &[&str] = &["title", "name", "eventName", "event_name", "headline"];
pub const START_KEYS: &[&str] = &[
    "startDate",
    "start_date",
    "start",
    "starts_at",
    "start_at",
    "start_datetime",
    "startDateTime",
    "dateTime",
    "datetime",
    "date",
    "event_date",
    "eventDate",
];
pub const END_KEYS: &[&str] = &["endDate", "end_date", "end", "ends_at", "end_at", "end_datetime", "endDateTime"];
const START_TIME_KEYS: &[&str] = &["start_time", "startTime", "time", "show_time", "showTime", "doors"];
const END_TIME_KEYS: &[&str] = &["end_time", "endTime"];
const ZONE_KEYS: &[&str] = &["timezone", "timeZone", "time_zone", "tz", "timeZoneId", "timezone_id"];
const VENUE_KEYS: &[&str] = &["venue", "location", "place"];
const VENUE_NAME_KEYS: &[&str] = &["name", "title", "venue", "venue_name", "venueName"];
const STREET_KEYS: &[&str] = &[
    "address",
    "street",
    "address1",
    "address_1",
    "streetAddress",
    "address_line_1",
    "addressLine1",
];
const CITY_KEYS: &[&str] = &["city", "addressLocality", "locality", "town"];
const STATE_KEYS: &[&str] = &["state", "region", "province", "stateprovince", "addressRegion", "state_code"];
const ZIP_KEYS: &[&str] = &["zip", "postal_code", "postalCode", "zipcode", "postcode", "zip_code"];
const COUNTRY_KEYS: &[&str] = &["country", "addressCountry", "country_code", "countryCode"];
const LAT_KEYS: &[&str] = &["latitude", "lat"];
const LNG_KEYS: &[&str] = &["longitude", "lng", "lon", "long"];
const PRICE_KEYS: &[&str] = &["price", "cost", "ticket_price", "priceRange", "price_range", "prices"];
const TICKET_KEYS: &[&str] = &[
    "ticket_url",
    "ticketUrl",
    "tickets_url",
    "ticketsUrl",
    "ticket_link",
    "url",
    "link",
    "permalink",
    "website",
];
const IMAGE_KEYS: &[&str] = &[
    "image",
    "imageUrl",
    "image_url",
    "thumbnail",
    "thumbnail_url",
    "featured_image",
    "poster",
    "photo",
];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "excerpt", "content", "details", "body"];
const PERFORMER_KEYS: &[&str] = &["performer", "performers", "artist", "artists", "headliner", "lineup"];
const ORGANIZER_KEYS: &[&str] = &["organizer", "organiser", "promoter", "presenter"];

/// Scalar-ish text of a JSON value: strings, numbers, or `{text|rendered|name|html}` wrappers
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["text", "rendered", "name", "html", "value"]
            .iter()
            .find_map(|k| map.get(*k).and_then(text_of)),
        _ => None,
    }
}

/// First key present with usable text
pub fn str_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| value.get(*k).and_then(text_of))
}

/// First key present with a non-null value
pub fn value_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| value.get(*k).filter(|v| !v.is_null()))
}

/// URL from a string, an `{url|src|href}` object, or the first item of an array
pub fn url_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => ["url", "src", "href", "original", "large", "square", "contentUrl"]
            .iter()
            .find_map(|k| map.get(*k).and_then(url_of)),
        Value::Array(items) => items.iter().find_map(url_of),
        _ => None,
    }
}

/// Names from a string, an object with a name, or an array of either, joined with ", "
pub fn names_of(value: &Value) -> Option<String> {
    let names: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(single_name).collect(),
        other => single_name(other).into_iter().collect(),
    };
    let joined = names.join(", ");
    (!joined.is_empty()).then_some(joined)
}

fn single_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => ["name", "title", "details", "organizer", "artist"]
            .iter()
            .find_map(|k| map.get(*k).and_then(text_of))
            .map(|s| clean_text(&s)),
        other => text_of(other).map(|s| clean_text(&s)),
    }
    .filter(|s| !s.is_empty())
}

/// Resolve a date-ish JSON value: ISO strings, epoch numbers, or
/// `{local|dateTime|date|utc, timezone}` objects (Eventbrite, Google)
pub fn datetime_of(value: &Value, zone: Option<Tz>) -> Option<DateTimeParts> {
    match value {
        Value::String(s) => dates::parse_datetime(s, zone),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Seconds and milliseconds are both in the wild
            let millis = if raw.abs() < 100_000_000_000 { raw * 1000 } else { raw };
            dates::from_epoch_millis(millis, zone)
        }
        Value::Object(map) => {
            let own_zone = str_at(value, ZONE_KEYS).and_then(|z| dates::parse_timezone(&z)).or(zone);
            if let Some(local) = map.get("local").and_then(Value::as_str) {
                return dates::parse_datetime(local, None);
            }
            ["dateTime", "datetime", "date", "utc", "value"]
                .iter()
                .find_map(|k| map.get(*k))
                .and_then(|v| datetime_of(v, own_zone))
        }
        _ => None,
    }
}

static SHOW_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bshow(?:\s*time)?s?\s*[:@\-]?\s*(\d{1,2}(?:[:.]\d{2})?\s*(?:a\.?\s?m\.?|p\.?\s?m\.?))")
        .expect("valid show regex")
});

static DOORS_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdoors?\s*(?:open)?\s*[:@\-]?\s*(\d{1,2}(?:[:.]\d{2})?\s*(?:a\.?\s?m\.?|p\.?\s?m\.?))")
        .expect("valid doors regex")
});

/// "Doors: 7pm / Show: 8pm" listings: the show time is the start time, doors is the
/// fallback.
pub fn show_time_from_text(text: &str) -> Option<NaiveTime> {
    SHOW_TIME_RE
        .captures(text)
        .or_else(|| DOORS_TIME_RE.captures(text))
        .and_then(|caps| dates::parse_time_text(&caps[1]))
}

/// True for objects that carry both a title-ish and a start-ish key
pub fn looks_like_event(value: &Value) -> bool {
    value.is_object() && str_at(value, TITLE_KEYS).is_some() && value_at(value, START_KEYS).is_some()
}

/// Depth-first search for arrays whose items are mostly event-like objects
pub fn find_event_arrays(value: &Value) -> Vec<&Vec<Value>> {
    let mut found = Vec::new();
    collect_event_arrays(value, 0, &mut found);
    found
}

fn collect_event_arrays<'a>(value: &'a Value, depth: usize, found: &mut Vec<&'a Vec<Value>>) {
    if depth > 10 {
        return;
    }
    match value {
        Value::Array(items) => {
            let eventish = items.iter().filter(|v| looks_like_event(v)).count();
            if eventish > 0 && eventish * 2 >= items.len() {
                found.push(items);
                return;
            }
            for item in items {
                collect_event_arrays(item, depth + 1, found);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_event_arrays(child, depth + 1, found);
            }
        }
        _ => {}
    }
}

/// Venue fields from a venue object or string, written into `event`
pub fn apply_venue_value(event: &mut NormalizedEvent, venue: &Value) {
    match venue {
        Value::String(s) => {
            let s = clean_text(s);
            if s.is_empty() {
                return;
            }
            // "Name, 123 Street, City, ST 12345" keeps the name and splits the rest
            if s.contains(',') && s.chars().any(|c| c.is_ascii_digit()) {
                let (name, rest) = s.split_once(',').unwrap_or((s.as_str(), ""));
                if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    apply_address_text(event, &s);
                } else {
                    event.venue_name.get_or_insert_with(|| name.trim().to_string());
                    apply_address_text(event, rest);
                }
            } else {
                event.venue_name.get_or_insert(s);
            }
        }
        Value::Object(_) => {
            if event.venue_name.is_none() {
                event.venue_name = str_at(venue, VENUE_NAME_KEYS).map(|s| clean_text(&s));
            }
            match value_at(venue, STREET_KEYS) {
                Some(addr @ Value::Object(_)) => apply_venue_value(event, addr),
                Some(addr) => {
                    if let Some(text) = text_of(addr) {
                        if event.venue_address.is_none() {
                            let has_city = value_at(venue, CITY_KEYS).is_some();
                            if has_city {
                                event.venue_address = Some(collapse_whitespace(&text));
                            } else {
                                apply_address_text(event, &text);
                            }
                        }
                    }
                }
                None => {}
            }
            fill(&mut event.venue_city, str_at(venue, CITY_KEYS));
            fill(&mut event.venue_state, str_at(venue, STATE_KEYS));
            fill(&mut event.venue_zip, str_at(venue, ZIP_KEYS));
            fill(&mut event.venue_country, str_at(venue, COUNTRY_KEYS));
            if event.venue_timezone.is_none() {
                event.venue_timezone = str_at(venue, ZONE_KEYS)
                    .and_then(|z| dates::parse_timezone(&z))
                    .map(|tz| tz.name().to_string());
            }
            if event.venue_coordinates.is_none() {
                event.venue_coordinates = coordinates_of(venue);
            }
        }
        _ => {}
    }
}

/// "lat,lng" from latitude/longitude keys or a nested `geo`/`coordinates` object
pub fn coordinates_of(value: &Value) -> Option<String> {
    if let (Some(lat), Some(lng)) = (str_at(value, LAT_KEYS), str_at(value, LNG_KEYS)) {
        return Some(format!("{},{}", lat, lng));
    }
    ["geo", "coordinates", "location"]
        .iter()
        .filter_map(|k| value.get(*k))
        .filter(|v| v.is_object())
        .find_map(|v| match (str_at(v, LAT_KEYS), str_at(v, LNG_KEYS)) {
            (Some(lat), Some(lng)) => Some(format!("{},{}", lat, lng)),
            _ => None,
        })
}

/// Split a single-line address into the event's venue address fields
pub fn apply_address_text(event: &mut NormalizedEvent, text: &str) {
    let parts = split_address(text);
    fill(&mut event.venue_address, parts.street);
    fill(&mut event.venue_city, parts.city);
    fill(&mut event.venue_state, parts.state);
    fill(&mut event.venue_zip, parts.zip);
    fill(&mut event.venue_country, parts.country);
}

pub(crate) fn fill(target: &mut Option<String>, value: Option<String>) {
    if target.is_none() {
        *target = value.map(|v| collapse_whitespace(&v)).filter(|v| !v.is_empty());
    }
}

fn set_start(event: &mut NormalizedEvent, parts: DateTimeParts) {
    event.start_date = Some(parts.date_string());
    event.start_time = parts.time_string();
}

fn set_end(event: &mut NormalizedEvent, parts: DateTimeParts) {
    event.end_date = Some(parts.date_string());
    event.end_time = parts.time_string();
}

/// Map a loosely shaped event object. `feed_zone` is used when the item carries no zone
/// of its own. Returns `None` without a title.
pub fn map_event_object(obj: &Value, feed_zone: Option<Tz>) -> Option<NormalizedEvent> {
    let title = str_at(obj, TITLE_KEYS).map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
    let mut event = NormalizedEvent::new(title);

    let venue = value_at(obj, VENUE_KEYS);
    let event_zone = str_at(obj, ZONE_KEYS)
        .and_then(|z| dates::parse_timezone(&z))
        .or_else(|| venue.and_then(|v| str_at(v, ZONE_KEYS)).and_then(|z| dates::parse_timezone(&z)));
    let zone = event_zone.or(feed_zone);
    event.venue_timezone = zone.map(|tz| tz.name().to_string());

    if let Some(parts) = value_at(obj, START_KEYS).and_then(|v| datetime_of(v, zone)) {
        set_start(&mut event, parts);
    }
    if let Some(parts) = value_at(obj, END_KEYS).and_then(|v| datetime_of(v, zone)) {
        set_end(&mut event, parts);
    }

    event.description = value_at(obj, DESCRIPTION_KEYS)
        .and_then(text_of)
        .and_then(|d| clean_optional(Some(&d)));

    if event.start_time.is_none() {
        let explicit = str_at(obj, START_TIME_KEYS)
            .filter(|t| dates::parse_datetime(t, None).is_none())
            .and_then(|t| show_time_from_text(&t).or_else(|| dates::parse_time_text(&t)));
        let from_text = || event.description.as_deref().and_then(show_time_from_text);
        event.start_time = explicit.or_else(from_text).map(dates::format_time);
    }
    if event.end_time.is_none() {
        event.end_time = str_at(obj, END_TIME_KEYS)
            .and_then(|t| dates::parse_time_text(&t))
            .map(dates::format_time);
    }

    if let Some(venue) = venue {
        apply_venue_value(&mut event, venue);
    }
    fill(&mut event.venue_name, str_at(obj, &["venue_name", "venueName"]));
    if event.venue_address.is_none() {
        if let Some(addr) = obj.get("address").and_then(text_of) {
            apply_address_text(&mut event, &addr);
        }
    }
    fill(&mut event.venue_city, str_at(obj, CITY_KEYS));
    fill(&mut event.venue_state, str_at(obj, STATE_KEYS));
    fill(&mut event.venue_zip, str_at(obj, ZIP_KEYS));
    fill(&mut event.venue_country, str_at(obj, COUNTRY_KEYS));
    if event.venue_coordinates.is_none() {
        event.venue_coordinates = coordinates_of(obj);
    }

    event.price = value_at(obj, PRICE_KEYS).and_then(price_of);
    event.ticket_url = value_at(obj, TICKET_KEYS).and_then(url_of);
    event.image_url = value_at(obj, IMAGE_KEYS).and_then(url_of);
    event.performer = value_at(obj, PERFORMER_KEYS).and_then(names_of);
    event.organizer = value_at(obj, ORGANIZER_KEYS).and_then(names_of);
    event.raw = Some(obj.clone());
    Some(event)
}

/// Price text from strings, numbers, `{min,max}` ranges or arrays of those
pub fn price_of(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(price_of),
        Value::Object(map) => {
            let min = map.get("min").or_else(|| map.get("minPrice")).and_then(text_of);
            let max = map.get("max").or_else(|| map.get("maxPrice")).and_then(text_of);
            match (min, max) {
                (Some(min), Some(max)) if min != max => Some(format!("{} - {}", min, max)),
                (Some(min), _) => Some(min),
                (None, Some(max)) => Some(max),
                (None, None) => text_of(value).or_else(|| map.get("display").and_then(text_of)),
            }
        }
        other => text_of(other).map(|s| clean_text(&s)).filter(|s| !s.is_empty()),
    }
}
