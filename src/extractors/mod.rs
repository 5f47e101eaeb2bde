//! Format extractors and the priority-ordered registry that probes them.
//!
//! Each extractor recognises exactly one embedded-data shape. `can_handle` must stay
//! cheap (substring and prefix checks) because every extractor is probed on every
//! page; `extract` never fails, malformed input just yields no events.

pub mod bandsintown;
pub mod dice;
pub mod eventbrite;
pub mod google_calendar;
pub mod ical_feed;
pub mod ics;
pub mod json_event;
pub mod jsonld;
pub mod microdata;
pub mod next_data;
pub mod rest_json;
pub mod squarespace;
pub mod tribe;
pub mod wix;
pub mod wordpress_rest;

use crate::app::ports::{FetchOptions, HttpClientPort};
use crate::common::dates::ReferenceDate;
use crate::common::types::{ExtractionResult, NormalizedEvent};
use crate::observability::metrics;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Core trait every structured-data extractor implements
#[async_trait]
pub trait EventExtractor: Send + Sync {
    /// Stable name recorded as the extraction method
    fn identifier(&self) -> &'static str;

    /// Cheap probe: substring/prefix checks only, no full parsing
    fn can_handle(&self, content: &str) -> bool;

    /// Parse every event in `content`. Returns an empty vec on any parse failure.
    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent>;
}

/// Ordered extractor chain. Built once at startup and shared by reference.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn EventExtractor>>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Box<dyn EventExtractor>>) -> Self {
        Self { extractors }
    }

    /// The standard chain: platform JSON first, then schema.org data, then calendar
    /// feeds, then discovered and generic REST shapes. `reference` anchors year
    /// inference for human-written dates.
    pub fn standard(http: Arc<dyn HttpClientPort>, fetch_options: FetchOptions, reference: ReferenceDate) -> Self {
        Self::new(vec![
            Box::new(wix::WixEventsExtractor),
            Box::new(squarespace::SquarespaceExtractor),
            Box::new(eventbrite::EventbriteExtractor),
            Box::new(dice::DiceExtractor),
            Box::new(bandsintown::BandsintownExtractor),
            Box::new(tribe::TribeEventsExtractor),
            Box::new(next_data::NextDataExtractor),
            Box::new(jsonld::JsonLdExtractor),
            Box::new(microdata::MicrodataExtractor::new(reference)),
            Box::new(ics::IcsExtractor),
            Box::new(google_calendar::GoogleCalendarExtractor::new(
                http.clone(),
                fetch_options.clone(),
            )),
            Box::new(ical_feed::IcalFeedExtractor::new(http.clone(), fetch_options.clone())),
            Box::new(wordpress_rest::WordpressRestExtractor::new(http, fetch_options)),
            Box::new(rest_json::RestJsonExtractor),
        ])
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.identifier()).collect()
    }

    /// Probe extractors in order. The first one that claims the content and yields at
    /// least one event wins; a claim with zero events falls through to the next.
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn extract(&self, content: &str, source_url: &str) -> Option<ExtractionResult> {
        for extractor in &self.extractors {
            if !extractor.can_handle(content) {
                continue;
            }
            let method = extractor.identifier();
            let mut events = extractor.extract(content, source_url).await;
            if events.is_empty() {
                debug!("{} claimed the page but produced no events", method);
                continue;
            }
            for event in events.iter_mut() {
                if event.source_url.is_none() {
                    event.source_url = Some(source_url.to_string());
                }
            }
            info!("{} extracted {} events from {}", method, events.len(), source_url);
            metrics::extract::extractor_matched(method, events.len());
            return Some(ExtractionResult { method, events });
        }
        None
    }
}

/// Parse the first JSON value that starts after `marker` (e.g. `window.__SERVER_DATA__ =`).
/// Trailing script text after the value is ignored.
pub(crate) fn json_after_marker(content: &str, marker: &str) -> Option<Value> {
    let start = content.find(marker)? + marker.len();
    let rest = &content[start..];
    let offset = rest.find(['{', '['])?;
    parse_leading_json(&rest[offset..])
}

/// Parse one JSON value from the start of `text`, ignoring whatever follows it
pub(crate) fn parse_leading_json(text: &str) -> Option<Value> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    stream.next()?.ok()
}

/// Parse a whole document as JSON, tolerating a UTF-8 BOM and surrounding whitespace
pub(crate) fn parse_json_document(content: &str) -> Option<Value> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    serde_json::from_str(trimmed).ok()
}

/// Cheap check used by the JSON-shaped extractors' `can_handle`
pub(crate) fn looks_like_json(content: &str) -> bool {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Text of every `<script>` matching `selector`
pub(crate) fn script_bodies(content: &str, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let document = Html::parse_document(content);
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect()
}
