use super::ics::parse_calendar;
use super::EventExtractor;
use crate::app::ports::{FetchOptions, HttpClientPort};
use crate::common::constants::ICAL_FEED;
use crate::common::types::NormalizedEvent;
use crate::pagination::resolve_href;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};

static FEED_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"link[type="text/calendar"][href], a[href^="webcal:"], a[href*=".ics"]"#)
        .expect("valid feed link selector")
});

/// Feed URLs advertised by the page, resolved and deduplicated in document order.
/// `webcal://` is fetched over https.
pub fn find_feed_urls(content: &str, source_url: &str) -> Vec<String> {
    let document = Html::parse_document(content);
    let mut urls: Vec<String> = Vec::new();
    for el in document.select(&FEED_SELECTOR) {
        let Some(raw) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        let webcal = raw.strip_prefix("webcal://");
        let href = match webcal {
            Some(rest) => format!("https://{}", rest),
            None => raw.to_string(),
        };
        let Some(resolved) = resolve_href(source_url, &href) else {
            continue;
        };
        let path = resolved.split(['?', '#']).next().unwrap_or_default().to_lowercase();
        let is_feed = el.value().name() == "link" || webcal.is_some() || path.ends_with(".ics");
        if is_feed && !urls.contains(&resolved) {
            urls.push(resolved);
        }
    }
    urls
}

/// Pages linking an iCal feed (`<link type="text/calendar">`, `webcal://` or `.ics` anchors)
pub struct IcalFeedExtractor {
    http: Arc<dyn HttpClientPort>,
    fetch_options: FetchOptions,
}

impl IcalFeedExtractor {
    pub fn new(http: Arc<dyn HttpClientPort>, fetch_options: FetchOptions) -> Self {
        Self { http, fetch_options }
    }
}

#[async_trait]
impl EventExtractor for IcalFeedExtractor {
    fn identifier(&self) -> &'static str {
        ICAL_FEED
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains("text/calendar") || content.contains("webcal:") || content.contains(".ics")
    }

    /// The first advertised feed that yields events wins
    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        for feed_url in find_feed_urls(content, source_url) {
            let response = self.http.get(&feed_url, &self.fetch_options).await;
            if !response.has_content() {
                debug!("ical_feed: {} returned nothing", feed_url);
                continue;
            }
            let events = parse_calendar(&response.body, None);
            if !events.is_empty() {
                info!("ical_feed: {} events from {}", events.len(), feed_url);
                return events;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::FetchResponse;

    struct OneFeed;

    #[async_trait]
    impl HttpClientPort for OneFeed {
        async fn get(&self, url: &str, _options: &FetchOptions) -> FetchResponse {
            if url == "https://venue.example/events/calendar.ics" {
                FetchResponse::ok(
                    200,
                    "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART;VALUE=DATE:20251003\nSUMMARY:Film Night\nEND:VEVENT\nEND:VCALENDAR\n",
                )
            } else {
                FetchResponse::failed(404, "not found")
            }
        }
    }

    const PAGE: &str = r#"<html><head>
<link rel="alternate" type="text/calendar" href="/missing.ics">
</head><body>
<a href="webcal://venue.example/events/calendar.ics">Subscribe</a>
<a href="calendar.ics">Download</a>
<a href="/about">About</a>
</body></html>"#;

    #[test]
    fn resolves_feed_links_in_document_order() {
        let urls = find_feed_urls(PAGE, "https://venue.example/events/");
        assert_eq!(
            urls,
            vec![
                "https://venue.example/missing.ics".to_string(),
                "https://venue.example/events/calendar.ics".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn falls_through_failed_feeds() {
        let extractor = IcalFeedExtractor::new(Arc::new(OneFeed), FetchOptions::default());
        assert!(extractor.can_handle(PAGE));
        let events = extractor.extract(PAGE, "https://venue.example/events/").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Film Night");
        assert_eq!(events[0].start_date.as_deref(), Some("2025-10-03"));
    }
}
