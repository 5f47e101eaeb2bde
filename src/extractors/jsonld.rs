use super::json_event::{apply_venue_value, names_of, price_of, str_at, text_of, url_of};
use super::{script_bodies, EventExtractor};
use crate::common::constants::JSON_LD;
use crate::common::dates;
use crate::common::text::{clean_optional, clean_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// schema.org `Event` objects (and subtypes such as `MusicEvent`) in
/// `<script type="application/ld+json">` blocks
pub struct JsonLdExtractor;

fn type_names(value: &Value) -> Vec<&str> {
    match value.get("@type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn is_event_type(value: &Value) -> bool {
    type_names(value)
        .iter()
        .any(|t| t.rsplit('/').next().unwrap_or(t).ends_with("Event"))
}

/// Flatten arrays, `@graph` and `ItemList` wrappers into candidate nodes
fn collect_nodes<'a>(value: &'a Value, out: &mut Vec<&'a Value>, depth: usize) {
    if depth > 6 {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_nodes(item, out, depth + 1);
            }
        }
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_nodes(graph, out, depth + 1);
            }
            if let Some(elements) = map.get("itemListElement") {
                collect_nodes(elements, out, depth + 1);
            }
            // ListItem wrappers
            if type_names(value).contains(&"ListItem") {
                if let Some(item) = map.get("item") {
                    collect_nodes(item, out, depth + 1);
                }
            }
            if is_event_type(value) {
                out.push(value);
            }
        }
        _ => {}
    }
}

/// Some CMSes emit raw control characters inside JSON-LD strings
fn parse_lenient(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    serde_json::from_str(trimmed).ok().or_else(|| {
        let cleaned: String = trimmed
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        serde_json::from_str(&cleaned).ok()
    })
}

impl JsonLdExtractor {
    pub(crate) fn map_node(node: &Value) -> Option<NormalizedEvent> {
        let title = str_at(node, &["name", "headline"]).map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
        let mut event = NormalizedEvent::new(title).with_raw(node.clone());

        if let Some(parts) = str_at(node, &["startDate"]).and_then(|d| dates::parse_datetime(&d, None)) {
            event.start_date = Some(parts.date_string());
            event.start_time = parts.time_string();
        }
        if let Some(parts) = str_at(node, &["endDate"]).and_then(|d| dates::parse_datetime(&d, None)) {
            event.end_date = Some(parts.date_string());
            event.end_time = parts.time_string();
        }
        event.description = node
            .get("description")
            .and_then(text_of)
            .and_then(|d| clean_optional(Some(&d)));

        match node.get("location") {
            Some(Value::Array(places)) => {
                let physical = places
                    .iter()
                    .find(|p| !type_names(p).contains(&"VirtualLocation"))
                    .or_else(|| places.first());
                if let Some(place) = physical {
                    apply_venue_value(&mut event, place);
                }
            }
            Some(place) if !type_names(place).contains(&"VirtualLocation") => apply_venue_value(&mut event, place),
            _ => {}
        }

        if let Some(offers) = node.get("offers") {
            let first = match offers {
                Value::Array(items) => items.first(),
                other => Some(other),
            };
            if let Some(offer) = first {
                event.price = offer_price(offer);
                event.ticket_url = str_at(offer, &["url"]);
            }
        }
        if event.ticket_url.is_none() {
            event.ticket_url = str_at(node, &["url"]);
        }
        event.image_url = node.get("image").and_then(url_of);
        event.performer = node.get("performer").and_then(names_of);
        event.organizer = node.get("organizer").and_then(names_of);
        Some(event)
    }
}

fn offer_price(offer: &Value) -> Option<String> {
    let currency = str_at(offer, &["priceCurrency"]);
    let amount = match (str_at(offer, &["lowPrice"]), str_at(offer, &["highPrice"])) {
        (Some(low), Some(high)) if low != high => Some(format!("{} - {}", low, high)),
        (Some(low), _) => Some(low),
        _ => offer.get("price").and_then(price_of),
    }?;
    if amount == "0" || amount == "0.00" {
        return Some("Free".to_string());
    }
    Some(match currency {
        Some(code) if !amount.contains(code.as_str()) && amount.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
            format!("{} {}", amount, code)
        }
        _ => amount,
    })
}

#[async_trait]
impl EventExtractor for JsonLdExtractor {
    fn identifier(&self) -> &'static str {
        JSON_LD
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains("application/ld+json")
    }

    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        for body in script_bodies(content, r#"script[type="application/ld+json"]"#) {
            let Some(value) = parse_lenient(&body) else {
                debug!("jsonld: skipping unparseable block on {}", source_url);
                continue;
            };
            let mut nodes = Vec::new();
            collect_nodes(&value, &mut nodes, 0);
            events.extend(nodes.into_iter().filter_map(Self::map_node));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<script type="application/ld+json">{"@context":"https://schema.org","@type":"Organization","name":"The Venue"}</script>
<script type="application/ld+json">
{"@context":"https://schema.org","@graph":[
  {"@type":"MusicEvent","name":"Harbor Lights","startDate":"2025-07-19T20:00:00-07:00","endDate":"2025-07-19T23:00:00-07:00",
   "description":"An evening of &quot;soft&quot; rock",
   "location":{"@type":"Place","name":"Pier Hall","address":{"@type":"PostalAddress","streetAddress":"9 Wharf Way","addressLocality":"Portland","addressRegion":"OR","postalCode":"97201","addressCountry":{"@type":"Country","name":"US"}},"geo":{"@type":"GeoCoordinates","latitude":45.52,"longitude":-122.68}},
   "offers":[{"@type":"Offer","price":"22.50","priceCurrency":"USD","url":"https://tix.example/harbor"}],
   "performer":[{"@type":"MusicGroup","name":"Harbor Lights"},{"@type":"Person","name":"Ana Ruiz"}],
   "image":["https://venue.example/h1.jpg","https://venue.example/h2.jpg"]}
]}
</script>
<script type="application/ld+json">{"@type":"ItemList","itemListElement":[{"@type":"ListItem","position":1,"item":{"@type":"Event","name":"Open Stage","startDate":"2025-07-20"}}]}</script>
</head><body></body></html>"#;

    #[tokio::test]
    async fn reads_graph_and_item_list_events() {
        let extractor = JsonLdExtractor;
        assert!(extractor.can_handle(PAGE));
        let events = extractor.extract(PAGE, "https://venue.example/").await;
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.title, "Harbor Lights");
        assert_eq!(first.start_date.as_deref(), Some("2025-07-19"));
        assert_eq!(first.start_time.as_deref(), Some("20:00"));
        assert_eq!(first.end_time.as_deref(), Some("23:00"));
        assert_eq!(first.venue_timezone, None);
        assert_eq!(first.description.as_deref(), Some("An evening of \"soft\" rock"));
        assert_eq!(first.venue_name.as_deref(), Some("Pier Hall"));
        assert_eq!(first.venue_address.as_deref(), Some("9 Wharf Way"));
        assert_eq!(first.venue_city.as_deref(), Some("Portland"));
        assert_eq!(first.venue_state.as_deref(), Some("OR"));
        assert_eq!(first.venue_zip.as_deref(), Some("97201"));
        assert_eq!(first.venue_country.as_deref(), Some("US"));
        assert_eq!(first.venue_coordinates.as_deref(), Some("45.52,-122.68"));
        assert_eq!(first.price.as_deref(), Some("22.50 USD"));
        assert_eq!(first.ticket_url.as_deref(), Some("https://tix.example/harbor"));
        assert_eq!(first.performer.as_deref(), Some("Harbor Lights, Ana Ruiz"));
        assert_eq!(first.image_url.as_deref(), Some("https://venue.example/h1.jpg"));

        assert_eq!(events[1].title, "Open Stage");
        assert_eq!(events[1].start_date.as_deref(), Some("2025-07-20"));
        assert_eq!(events[1].start_time, None);
    }

    #[tokio::test]
    async fn malformed_blocks_are_skipped() {
        let page = r#"<script type="application/ld+json">{"@type":"Event","name":</script>"#;
        assert!(JsonLdExtractor.extract(page, "https://x.example/").await.is_empty());
    }
}
