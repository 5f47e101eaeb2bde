use super::ics::parse_calendar;
use super::EventExtractor;
use crate::app::ports::{FetchOptions, HttpClientPort};
use crate::common::constants::GOOGLE_CALENDAR;
use crate::common::dates;
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use chrono_tz::Tz;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const EMBED_MARKER: &str = "calendar.google.com/calendar/embed";

/// A calendar id and display zone taken from one embed iframe
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEmbed {
    pub calendar_id: String,
    pub zone: Option<Tz>,
}

impl CalendarEmbed {
    /// Public ICS feed for the calendar
    pub fn feed_url(&self) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(self.calendar_id.as_bytes()).collect();
        format!("https://calendar.google.com/calendar/ical/{}/public/basic.ics", encoded)
    }
}

/// Calendar ids from `iframe[src*=calendar/embed]` (every `src` query parameter)
pub fn find_embeds(content: &str) -> Vec<CalendarEmbed> {
    let Ok(selector) = Selector::parse("iframe[src]") else {
        return Vec::new();
    };
    let document = Html::parse_document(content);
    let mut embeds: Vec<CalendarEmbed> = Vec::new();
    for iframe in document.select(&selector) {
        let Some(src) = iframe.value().attr("src").filter(|s| s.contains(EMBED_MARKER)) else {
            continue;
        };
        let absolute = if src.starts_with("//") { format!("https:{}", src) } else { src.to_string() };
        let Ok(url) = Url::parse(&absolute) else {
            debug!("google_calendar: unparseable embed src {}", src);
            continue;
        };
        let zone = url
            .query_pairs()
            .find(|(k, _)| k == "ctz")
            .and_then(|(_, v)| dates::parse_timezone(&v));
        for (_, id) in url.query_pairs().filter(|(k, _)| k == "src") {
            let embed = CalendarEmbed {
                calendar_id: id.trim().to_string(),
                zone,
            };
            if !embed.calendar_id.is_empty() && !embeds.contains(&embed) {
                embeds.push(embed);
            }
        }
    }
    embeds
}

/// Pages embedding a Google Calendar iframe: the public ICS feed is fetched and parsed
pub struct GoogleCalendarExtractor {
    http: Arc<dyn HttpClientPort>,
    fetch_options: FetchOptions,
}

impl GoogleCalendarExtractor {
    pub fn new(http: Arc<dyn HttpClientPort>, fetch_options: FetchOptions) -> Self {
        Self { http, fetch_options }
    }
}

#[async_trait]
impl EventExtractor for GoogleCalendarExtractor {
    fn identifier(&self) -> &'static str {
        GOOGLE_CALENDAR
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains(EMBED_MARKER)
    }

    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        for embed in find_embeds(content) {
            let feed_url = embed.feed_url();
            let response = self.http.get(&feed_url, &self.fetch_options).await;
            if !response.has_content() {
                warn!(
                    "google_calendar: feed {} for {} failed: {}",
                    feed_url,
                    source_url,
                    response.error.as_deref().unwrap_or("empty body")
                );
                continue;
            }
            events.extend(parse_calendar(&response.body, embed.zone));
        }
        events
    }
}
