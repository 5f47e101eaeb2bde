use super::tribe::TribeEventsExtractor;
use super::EventExtractor;
use crate::app::ports::{FetchOptions, HttpClientPort};
use crate::common::constants::WORDPRESS_REST;
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const API_LINK_REL: &str = "https://api.w.org/";
const TRIBE_MARKERS: &[&str] = &["tribe-events", "tribe_events", "the-events-calendar"];
const TRIBE_ROUTE: &str = "tribe/events/v1/events";

static API_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="https://api.w.org/"][href]"#).expect("valid api link selector"));

/// The Events Calendar endpoint for a WordPress page: from the advertised REST root,
/// else `/wp-json/` on the page's origin.
pub fn discover_endpoint(content: &str, source_url: &str) -> Option<String> {
    let document = Html::parse_document(content);
    let advertised = document
        .select(&API_LINK_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| Url::parse(source_url).ok()?.join(href.trim()).ok());
    let root = match advertised {
        Some(root) => root,
        None => Url::parse(source_url).ok()?.join("/wp-json/").ok()?,
    };
    // Plain-permalink roots (`?rest_route=/`) take the route as the query value
    let mut root = root.to_string();
    if !root.ends_with('/') {
        root.push('/');
    }
    Some(format!("{}{}", root, TRIBE_ROUTE))
}

/// WordPress sites running The Events Calendar: the REST endpoint is discovered
/// from the page and its JSON parsed like a direct Tribe response
pub struct WordpressRestExtractor {
    http: Arc<dyn HttpClientPort>,
    fetch_options: FetchOptions,
}

impl WordpressRestExtractor {
    pub fn new(http: Arc<dyn HttpClientPort>, fetch_options: FetchOptions) -> Self {
        Self { http, fetch_options }
    }
}

#[async_trait]
impl EventExtractor for WordpressRestExtractor {
    fn identifier(&self) -> &'static str {
        WORDPRESS_REST
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains(API_LINK_REL) && TRIBE_MARKERS.iter().any(|m| content.contains(m))
    }

    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        let Some(endpoint) = discover_endpoint(content, source_url) else {
            debug!("wordpress_rest: no endpoint derivable from {}", source_url);
            return Vec::new();
        };
        let response = self.http.get(&endpoint, &self.fetch_options).await;
        if !response.has_content() {
            debug!("wordpress_rest: {} returned nothing", endpoint);
            return Vec::new();
        }
        let events = TribeEventsExtractor::parse_response(&response.body);
        info!("wordpress_rest: {} events from {}", events.len(), endpoint);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::FetchResponse;

    struct TribeApi;

    #[async_trait]
    impl HttpClientPort for TribeApi {
        async fn get(&self, url: &str, _options: &FetchOptions) -> FetchResponse {
            assert_eq!(url, "https://bar.example/wp-json/tribe/events/v1/events");
            FetchResponse::ok(
                200,
                r#"{"events":[{"title":"Quiz","start_date":"2025-11-04 19:00:00","timezone":"Europe/Dublin","venue":{"venue":"Snug"}}],"total_pages":1}"#,
            )
        }
    }

    const PAGE: &str = r#"<html><head>
<link rel="https://api.w.org/" href="https://bar.example/wp-json/" />
<link rel="stylesheet" href="/wp-content/plugins/the-events-calendar/style.css">
</head><body class="tribe-events-page-template"></body></html>"#;

    #[test]
    fn endpoint_from_advertised_root_or_origin() {
        assert_eq!(
            discover_endpoint(PAGE, "https://bar.example/events/").as_deref(),
            Some("https://bar.example/wp-json/tribe/events/v1/events")
        );
        assert_eq!(
            discover_endpoint("<html></html>", "https://bar.example/events/list/").as_deref(),
            Some("https://bar.example/wp-json/tribe/events/v1/events")
        );
    }

    #[tokio::test]
    async fn fetches_discovered_endpoint() {
        let extractor = WordpressRestExtractor::new(Arc::new(TribeApi), FetchOptions::default());
        assert!(extractor.can_handle(PAGE));
        let events = extractor.extract(PAGE, "https://bar.example/events/").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Quiz");
        assert_eq!(events[0].venue_timezone.as_deref(), Some("Europe/Dublin"));
        assert_eq!(events[0].venue_name.as_deref(), Some("Snug"));
    }
}
