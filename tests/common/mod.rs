#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use event_scraper::app::ports::{FetchOptions, FetchResponse, HttpClientPort, ProcessedLedger};
use event_scraper::crawl::{CrawlOrchestrator, SourceFlow};
use event_scraper::infra::{InMemoryLedger, TermListMatcher};
use event_scraper::pipeline::NormalizationPipeline;
use event_scraper::FlowContext;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serves canned bodies by exact URL; anything else is a 404
#[derive(Default)]
pub struct FixtureHttp {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FixtureHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClientPort for FixtureHttp {
    async fn get(&self, url: &str, _options: &FetchOptions) -> FetchResponse {
        self.requests.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => FetchResponse::ok(200, body.clone()),
            None => FetchResponse::failed(404, "HTTP status 404 Not Found"),
        }
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
}

pub fn orchestrator_with_ledger(http: Arc<FixtureHttp>, ledger: Arc<dyn ProcessedLedger>) -> CrawlOrchestrator {
    let pipeline = NormalizationPipeline::new(ledger, Arc::new(TermListMatcher)).with_today(today());
    CrawlOrchestrator::new(http, FetchOptions::default(), pipeline)
}

pub fn orchestrator(http: Arc<FixtureHttp>) -> CrawlOrchestrator {
    orchestrator_with_ledger(http, Arc::new(InMemoryLedger::new()))
}

pub fn source(url: &str) -> SourceFlow {
    SourceFlow::new(FlowContext::new("fixture-flow"), url)
}

/// A page carrying one JSON-LD block with the given `(title, startDate)` events
pub fn jsonld_page(events: &[(&str, &str)]) -> String {
    let nodes: Vec<serde_json::Value> = events
        .iter()
        .map(|(title, date)| {
            serde_json::json!({
                "@context": "https://schema.org",
                "@type": "MusicEvent",
                "name": title,
                "startDate": date,
                "location": {"@type": "Place", "name": "The Crocodile"}
            })
        })
        .collect();
    format!(
        r#"<html><head><script type="application/ld+json">{}</script></head><body><h1>Shows</h1></body></html>"#,
        serde_json::Value::Array(nodes)
    )
}
