use super::json_event::{apply_address_text, fill, show_time_from_text};
use super::EventExtractor;
use crate::common::constants::MICRODATA;
use crate::common::dates::{self, ReferenceDate};
use crate::common::text::{clean_text, collapse_whitespace, element_text};
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

static SCOPE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[itemscope][itemtype]").expect("valid itemscope selector"));
static PROP_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[itemprop]").expect("valid itemprop selector"));

/// schema.org microdata: `itemscope` nodes whose `itemtype` is an `*Event`
pub struct MicrodataExtractor {
    reference: ReferenceDate,
}

fn is_event_scope(el: &ElementRef) -> bool {
    el.value()
        .attr("itemtype")
        .map(|t| {
            t.split_whitespace()
                .any(|t| t.contains("schema.org") && t.trim_end_matches('/').ends_with("Event"))
        })
        .unwrap_or(false)
}

/// Properties owned directly by `scope`: nested itemscopes keep their own props
fn direct_props<'a>(scope: ElementRef<'a>) -> Vec<(String, ElementRef<'a>)> {
    let mut out = Vec::new();
    for el in scope.select(&PROP_SELECTOR) {
        let owner = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().attr("itemscope").is_some());
        if owner.map(|o| (*o).id()) != Some((*scope).id()) {
            continue;
        }
        if let Some(names) = el.value().attr("itemprop") {
            for name in names.split_whitespace() {
                out.push((name.to_string(), el));
            }
        }
    }
    out
}

fn prop_value(el: &ElementRef) -> String {
    let v = el.value();
    if let Some(content) = v.attr("content") {
        return content.trim().to_string();
    }
    let attr = match v.name() {
        "time" => v.attr("datetime"),
        "a" | "link" | "area" => v.attr("href"),
        "img" | "source" | "audio" | "video" => v.attr("src"),
        "data" | "meter" => v.attr("value"),
        _ => None,
    };
    match attr {
        Some(a) => a.trim().to_string(),
        None => element_text(el),
    }
}

fn first<'a>(props: &'a [(String, ElementRef<'a>)], name: &str) -> Option<&'a ElementRef<'a>> {
    props.iter().find(|(n, _)| n == name).map(|(_, el)| el)
}

fn first_value(props: &[(String, ElementRef)], name: &str) -> Option<String> {
    first(props, name).map(prop_value).filter(|v| !v.is_empty())
}

/// Raw JSON view of the scope's direct props, kept on the record
fn props_to_json(props: &[(String, ElementRef)]) -> Value {
    let mut map = Map::new();
    for (name, el) in props {
        let value = if el.value().attr("itemscope").is_some() {
            props_to_json(&direct_props(*el))
        } else {
            Value::String(prop_value(el))
        };
        map.entry(name.clone()).or_insert(value);
    }
    Value::Object(map)
}

impl MicrodataExtractor {
    /// `reference` anchors the year of text dates such as "Sat June 7"
    pub fn new(reference: ReferenceDate) -> Self {
        Self { reference }
    }

    fn map_scope(scope: ElementRef, today: NaiveDate) -> Option<NormalizedEvent> {
        let props = direct_props(scope);
        let title = first_value(&props, "name").map(|t| clean_text(&t)).filter(|t| !t.is_empty())?;
        let mut event = NormalizedEvent::new(title).with_raw(props_to_json(&props));
        event.description = first_value(&props, "description").map(|d| clean_text(&d)).filter(|d| !d.is_empty());

        if let Some(start) = first_value(&props, "startDate") {
            Self::apply_start(&mut event, &start, today);
        }
        if let Some(parts) = first_value(&props, "endDate").and_then(|d| dates::parse_datetime(&d, None)) {
            event.end_date = Some(parts.date_string());
            event.end_time = parts.time_string();
        }
        // "Doors 7pm / Show 8pm" in the listing text
        if event.start_time.is_none() {
            let text = element_text(&scope);
            event.start_time = show_time_from_text(&text).map(dates::format_time);
        }

        if let Some(location) = first(&props, "location") {
            Self::apply_location(&mut event, *location);
        }
        if let Some(offer) = first(&props, "offers") {
            if offer.value().attr("itemscope").is_some() {
                let offer_props = direct_props(*offer);
                let price = first_value(&offer_props, "price").or_else(|| first_value(&offer_props, "lowPrice"));
                event.price = price.map(|p| match first_value(&offer_props, "priceCurrency") {
                    Some(code) if p.chars().next().is_some_and(|c| c.is_ascii_digit()) => format!("{} {}", p, code),
                    _ => p,
                });
                event.ticket_url = first_value(&offer_props, "url");
            } else {
                event.price = Some(prop_value(offer)).filter(|p| !p.is_empty());
            }
        }
        if event.ticket_url.is_none() {
            event.ticket_url = first_value(&props, "url");
        }
        event.image_url = first_value(&props, "image");
        event.performer = Self::names(&props, "performer");
        event.organizer = Self::names(&props, "organizer");
        Some(event)
    }

    fn apply_start(event: &mut NormalizedEvent, start: &str, today: NaiveDate) {
        if let Some(parts) = dates::parse_datetime(start, None) {
            event.start_date = Some(parts.date_string());
            event.start_time = parts.time_string();
            return;
        }
        // Human-written fallback: "Sat June 7, 8pm"
        if let Some(date) = dates::parse_date_text(start, today) {
            event.start_date = Some(dates::format_date(date));
            event.start_time = dates::parse_time_text(start).map(dates::format_time);
        }
    }

    fn apply_location(event: &mut NormalizedEvent, location: ElementRef) {
        if location.value().attr("itemscope").is_none() {
            let text = prop_value(&location);
            if !text.is_empty() {
                event.venue_name = Some(clean_text(&text));
            }
            return;
        }
        let place = direct_props(location);
        event.venue_name = first_value(&place, "name").map(|n| clean_text(&n));
        match first(&place, "address") {
            Some(address) if address.value().attr("itemscope").is_some() => {
                let parts = direct_props(*address);
                fill(&mut event.venue_address, first_value(&parts, "streetAddress"));
                fill(&mut event.venue_city, first_value(&parts, "addressLocality"));
                fill(&mut event.venue_state, first_value(&parts, "addressRegion"));
                fill(&mut event.venue_zip, first_value(&parts, "postalCode"));
                fill(&mut event.venue_country, first_value(&parts, "addressCountry"));
            }
            Some(address) => apply_address_text(event, &prop_value(address)),
            None => {}
        }
        if let Some(geo) = first(&place, "geo").filter(|g| g.value().attr("itemscope").is_some()) {
            let geo = direct_props(*geo);
            if let (Some(lat), Some(lng)) = (first_value(&geo, "latitude"), first_value(&geo, "longitude")) {
                event.venue_coordinates = Some(format!("{},{}", lat, lng));
            }
        }
    }

    fn names(props: &[(String, ElementRef)], prop: &str) -> Option<String> {
        let names: Vec<String> = props
            .iter()
            .filter(|(n, _)| n == prop)
            .filter_map(|(_, el)| {
                let name = if el.value().attr("itemscope").is_some() {
                    first_value(&direct_props(*el), "name")
                } else {
                    Some(prop_value(el))
                };
                name.map(|n| collapse_whitespace(&n)).filter(|n| !n.is_empty())
            })
            .collect();
        (!names.is_empty()).then(|| names.join(", "))
    }
}

#[async_trait]
impl EventExtractor for MicrodataExtractor {
    fn identifier(&self) -> &'static str {
        MICRODATA
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains("itemscope") && content.contains("schema.org") && content.contains("Event")
    }

    async fn extract(&self, content: &str, _source_url: &str) -> Vec<NormalizedEvent> {
        let today = self.reference.today();
        let document = Html::parse_document(content);
        document
            .select(&SCOPE_SELECTOR)
            .filter(is_event_scope)
            .filter_map(|scope| Self::map_scope(scope, today))
            .collect()
    }
}
