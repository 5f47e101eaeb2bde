//! DOM-heuristic fallback: when no structured format matched, locate the markup
//! nodes most likely to hold a single event and hand them out as provisional
//! sections for downstream (AI or manual) extraction.

pub mod widget;

use crate::common::constants::MIN_SECTION_CHARS;
use crate::common::dates;
use crate::pipeline::identity::section_identity;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Which finder rule produced a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionRule {
    StructuredAttributes,
    WidgetPayload,
    PlatformClass,
    GenericClass,
    ListItem,
}

impl SectionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionRule::StructuredAttributes => "structured_attributes",
            SectionRule::WidgetPayload => "widget_payload",
            SectionRule::PlatformClass => "platform_class",
            SectionRule::GenericClass => "generic_class",
            SectionRule::ListItem => "list_item",
        }
    }
}

/// One candidate node (or decoded widget event) and its identity
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub content: String,
    pub rule: SectionRule,
    pub identifier: String,
}

const LANDMARK_TAGS: &[&str] = &["html", "body", "header", "footer", "nav", "aside", "main"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid section selector")
}

static STRUCTURED: Lazy<Selector> =
    Lazy::new(|| selector(r#"[itemtype*="schema.org"][itemtype*="Event"], [data-event-id], [data-event]"#));

static WIDGET: Lazy<Selector> = Lazy::new(|| selector("[data-calendar-events], [data-events-payload]"));

static PLATFORM: Lazy<Selector> = Lazy::new(|| {
    selector(
        ".eventlist-event, \
         .tribe-events-calendar-list__event, .tribe-events-list-event, .type-tribe_events, \
         .rhpSingleEvent, \
         .seetickets-list-event-container, \
         .dice-event, .dice_event, \
         .eventItem, \
         article.EventItem, \
         .tw-section",
    )
});

static CLASSED: Lazy<Selector> = Lazy::new(|| selector("[class]"));

static EVENT_TABLE_ROWS: Lazy<Selector> = Lazy::new(|| {
    selector(r#"table[class*="event"] tr, table[class*="calendar"] tr, table[id*="event"] tr, table[id*="calendar"] tr"#)
});

static CONTAINER_ITEMS: Lazy<Selector> = Lazy::new(|| {
    selector(
        r#"ul[class*="event"] > li, ol[class*="event"] > li, [id*="event"] li, [class*="events"] li, [class*="calendar"] li, [class*="shows"] li"#,
    )
});

static TH: Lazy<Selector> = Lazy::new(|| selector("th"));
static TD: Lazy<Selector> = Lazy::new(|| selector("td"));

/// Single-event class tokens: `event`, `show-item`, `calendar_entry`, `gig-card`, ...
static EVENT_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|[-_])(event|show|gig|concert|calendar)([-_](item|entry|card|row|listing|block|info|wrapper|details|box))?$")
        .expect("valid event class regex")
});

fn has_event_class(el: &ElementRef) -> bool {
    el.value().classes().any(|c| EVENT_CLASS_RE.is_match(c))
}

/// Ordered heuristic rules, most specific first
#[derive(Debug, Default)]
pub struct SectionFinder;

impl SectionFinder {
    pub fn new() -> Self {
        Self
    }

    fn is_header_row(el: &ElementRef) -> bool {
        if el.value().name() != "tr" {
            return false;
        }
        let in_thead = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "thead");
        in_thead || (el.select(&TH).next().is_some() && el.select(&TD).next().is_none())
    }

    /// A table row whose own date text is already behind us
    fn is_past_row(el: &ElementRef, today: NaiveDate) -> bool {
        if el.value().name() != "tr" {
            return false;
        }
        let text = el.text().collect::<Vec<_>>().join(" ");
        dates::parse_date_text(&text, today).is_some_and(|date| date < today)
    }

    fn long_enough(content: &str) -> bool {
        content.chars().count() >= MIN_SECTION_CHARS
    }

    fn qualifies(el: &ElementRef, html: &str, today: NaiveDate) -> bool {
        !LANDMARK_TAGS.contains(&el.value().name())
            && !Self::is_header_row(el)
            && Self::long_enough(html)
            && !Self::is_past_row(el, today)
    }

    /// Every candidate in rule order, then document order; duplicates (same
    /// identity) keep their first position. Past-date checks compare against `today`.
    pub fn candidates(&self, html: &str, source_url: &str, today: NaiveDate) -> Vec<Section> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut push = |content: String, rule: SectionRule, out: &mut Vec<Section>| {
            let identifier = section_identity(source_url, &content);
            if seen.insert(identifier.clone()) {
                out.push(Section {
                    content,
                    rule,
                    identifier,
                });
            }
        };

        for el in document.select(&STRUCTURED) {
            let markup = el.html();
            if Self::qualifies(&el, &markup, today) {
                push(markup, SectionRule::StructuredAttributes, &mut out);
            }
        }

        for el in document.select(&WIDGET) {
            for attr in widget::PAYLOAD_ATTRIBUTES {
                let Some(encoded) = el.value().attr(attr) else {
                    continue;
                };
                for event in widget::decode_events(encoded, today) {
                    let content = event.to_string();
                    if Self::long_enough(&content) {
                        push(content, SectionRule::WidgetPayload, &mut out);
                    }
                }
            }
        }

        for el in document.select(&PLATFORM) {
            let markup = el.html();
            if Self::qualifies(&el, &markup, today) {
                push(markup, SectionRule::PlatformClass, &mut out);
            }
        }

        let generic = document
            .select(&CLASSED)
            .filter(has_event_class)
            .chain(document.select(&EVENT_TABLE_ROWS));
        for el in generic {
            let markup = el.html();
            if Self::qualifies(&el, &markup, today) {
                push(markup, SectionRule::GenericClass, &mut out);
            }
        }

        for el in document.select(&CONTAINER_ITEMS) {
            let markup = el.html();
            if Self::qualifies(&el, &markup, today) {
                push(markup, SectionRule::ListItem, &mut out);
            }
        }

        debug!("section finder: {} candidates on {}", out.len(), source_url);
        out
    }

    pub fn find_first(&self, html: &str, source_url: &str, today: NaiveDate) -> Option<Section> {
        self.candidates(html, source_url, today).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    const URL: &str = "https://venue.example/calendar";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn finder() -> SectionFinder {
        SectionFinder::new()
    }

    fn pad(text: &str) -> String {
        format!("{} with a long enough description to comfortably pass the minimum length check", text)
    }

    #[test]
    fn rules_are_ordered_by_specificity() {
        let html = format!(
            r#"<html><body>
<div class="event-card"><h3>{}</h3></div>
<article class="eventlist-event"><h2>{}</h2></article>
<div data-event-id="77"><h2>{}</h2></div>
</body></html>"#,
            pad("Generic"),
            pad("Squarespace"),
            pad("Structured")
        );
        let sections = finder().candidates(&html, URL, today());
        let rules: Vec<SectionRule> = sections.iter().map(|s| s.rule).collect();
        assert_eq!(
            rules,
            vec![SectionRule::StructuredAttributes, SectionRule::PlatformClass, SectionRule::GenericClass]
        );
        assert!(finder().find_first(&html, URL, today()).unwrap().content.contains("Structured"));
    }

    #[test]
    fn rejects_landmarks_short_nodes_and_header_rows() {
        let html = format!(
            r#"<html><body class="event">
<nav class="event">{}</nav>
<div class="event">short</div>
<table class="events"><thead><tr><th>{}</th></tr></thead>
<tr><th>{}</th></tr>
<tr><td>June 20</td><td>{}</td></tr></table>
</body></html>"#,
            pad("Nav"),
            pad("Head"),
            pad("Bare header"),
            pad("Row")
        );
        let sections = finder().candidates(&html, URL, today());
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("June 20"));
    }

    #[test]
    fn past_table_rows_are_skipped() {
        let html = format!(
            r#"<table class="calendar-table"><tr><td>2025-06-01</td><td>{}</td></tr><tr><td>2025-06-10</td><td>{}</td></tr></table>"#,
            pad("Old"),
            pad("Today")
        );
        let sections = finder().candidates(&html, URL, today());
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("Today"));
    }

    #[test]
    fn widget_payload_events_become_sections() {
        let payload = serde_json::json!([
            {"title": "CLOSED", "date": "2025-06-11"},
            {"title": "Trivia", "date": "2025-06-11", "description": "Six to a team, prizes for the top three tables"},
            {"title": "x"}
        ]);
        let html = format!(
            r#"<div id="cal" data-calendar-events="{}"></div>"#,
            STANDARD.encode(payload.to_string())
        );
        let sections = finder().candidates(&html, URL, today());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].rule, SectionRule::WidgetPayload);
        assert!(sections[0].content.contains("Trivia"));
    }

    #[test]
    fn section_rules_follow_the_given_date() {
        let html = format!(r#"<table class="calendar-table"><tr><td>2025-06-12</td><td>{}</td></tr></table>"#, pad("Gig"));
        assert_eq!(finder().candidates(&html, URL, today()).len(), 1);
        let later = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        assert!(finder().candidates(&html, URL, later).is_empty());
    }

    #[test]
    fn list_items_in_event_containers_are_last_resort() {
        let html = format!(r#"<ul class="upcoming-events-list"><li>{}</li><li>{}</li></ul>"#, pad("One"), pad("Two"));
        let sections = finder().candidates(&html, URL, today());
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|s| s.rule == SectionRule::ListItem));
        assert_ne!(sections[0].identifier, sections[1].identifier);
    }
}
