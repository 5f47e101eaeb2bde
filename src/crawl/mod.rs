//! The per-invocation crawl loop: fetch a page, probe the extractor registry, hand
//! matches to the pipeline, fall back to the section finder, then paginate.

use crate::app::ports::{FetchOptions, HttpClientPort};
use crate::common::constants::DEFAULT_MAX_PAGES;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{EventPackage, FlowContext, SectionPackage};
use crate::extractors::ExtractorRegistry;
use crate::observability::metrics;
use crate::pagination::PaginatorChain;
use crate::pipeline::identity::url_hash;
use crate::pipeline::{NormalizationPipeline, SourceRules};
use crate::section::SectionFinder;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    Fetching,
    Extracting,
    Emitting,
    Advancing,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    NoNextPage,
    PageCap,
    CycleDetected,
    FetchFailed,
    PartialCrawl,
}

impl ExhaustReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhaustReason::NoNextPage => "no_next_page",
            ExhaustReason::PageCap => "page_cap",
            ExhaustReason::CycleDetected => "cycle_detected",
            ExhaustReason::FetchFailed => "fetch_failed",
            ExhaustReason::PartialCrawl => "partial_crawl",
        }
    }
}

/// What one invocation produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CrawlOutcome {
    Event(EventPackage),
    Section(SectionPackage),
    Exhausted { reason: ExhaustReason, pages_fetched: u32 },
}

impl CrawlOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, CrawlOutcome::Exhausted { .. })
    }
}

/// Position of a single crawl. Lives for one invocation only.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub url: String,
    pub page: u32,
    pub phase: CrawlPhase,
    visited: HashSet<String>,
}

impl CrawlState {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page: 1,
            phase: CrawlPhase::Fetching,
            visited: HashSet::new(),
        }
    }

    /// Record the current URL as visited. False when it was seen before.
    pub fn visit(&mut self) -> bool {
        self.visited.insert(url_hash(&self.url))
    }

    pub fn advance(&mut self, next_url: String) {
        self.url = next_url;
        self.page += 1;
        self.phase = CrawlPhase::Fetching;
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// One configured source: where to start and how to filter
#[derive(Debug, Clone)]
pub struct SourceFlow {
    pub flow: FlowContext,
    pub source_url: String,
    pub rules: SourceRules,
}

impl SourceFlow {
    pub fn new(flow: FlowContext, source_url: impl Into<String>) -> Self {
        Self {
            flow,
            source_url: source_url.into(),
            rules: SourceRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: SourceRules) -> Self {
        self.rules = rules;
        self
    }
}

pub struct CrawlOrchestrator {
    http: Arc<dyn HttpClientPort>,
    fetch_options: FetchOptions,
    registry: ExtractorRegistry,
    sections: SectionFinder,
    paginator: PaginatorChain,
    pipeline: NormalizationPipeline,
    max_pages: u32,
}

impl CrawlOrchestrator {
    /// Standard registry, section finder and paginators. Extractors and sections
    /// share the pipeline's reference date.
    pub fn new(http: Arc<dyn HttpClientPort>, fetch_options: FetchOptions, pipeline: NormalizationPipeline) -> Self {
        Self {
            registry: ExtractorRegistry::standard(http.clone(), fetch_options.clone(), pipeline.reference()),
            sections: SectionFinder::new(),
            paginator: PaginatorChain::standard(),
            http,
            fetch_options,
            pipeline,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_paginator(mut self, paginator: PaginatorChain) -> Self {
        self.paginator = paginator;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn section_finder(&self) -> &SectionFinder {
        &self.sections
    }

    /// The reference date as of this call
    pub fn today(&self) -> NaiveDate {
        self.pipeline.today()
    }

    fn exhaust(&self, state: &mut CrawlState, reason: ExhaustReason, pages_fetched: u32) -> Result<CrawlOutcome> {
        state.phase = CrawlPhase::Exhausted;
        info!(
            "crawl exhausted at page {} ({}): {}",
            state.page,
            state.url,
            reason.as_str()
        );
        metrics::crawl::exhausted(reason.as_str());
        Ok(CrawlOutcome::Exhausted { reason, pages_fetched })
    }

    /// Run one invocation for `source`. Returns at most one event (or one provisional
    /// section); only a missing source URL is an error.
    #[instrument(skip(self, source), fields(flow_id = %source.flow.flow_id))]
    pub async fn crawl(&self, source: &SourceFlow) -> Result<CrawlOutcome> {
        let start_url = source.source_url.trim();
        if start_url.is_empty() {
            return Err(ScraperError::Config(format!(
                "source '{}' has no source_url",
                source.flow.flow_id
            )));
        }

        let mut state = CrawlState::new(start_url);
        let mut pages_fetched = 0u32;

        loop {
            state.phase = CrawlPhase::Fetching;
            if !state.visit() {
                return self.exhaust(&mut state, ExhaustReason::CycleDetected, pages_fetched);
            }

            debug!("fetching page {}: {}", state.page, state.url);
            let response = self.http.get(&state.url, &self.fetch_options).await;
            if !response.has_content() {
                warn!(
                    "fetch of {} failed (status {}): {}",
                    state.url,
                    response.status_code,
                    response.error.as_deref().unwrap_or("empty body")
                );
                let reason = if state.page == 1 {
                    ExhaustReason::FetchFailed
                } else {
                    ExhaustReason::PartialCrawl
                };
                return self.exhaust(&mut state, reason, pages_fetched);
            }
            pages_fetched += 1;
            metrics::crawl::page_fetched();
            let body = response.body;

            state.phase = CrawlPhase::Extracting;
            match self.registry.extract(&body, &state.url).await {
                Some(result) => {
                    if let Some(package) = self.pipeline.process(result, &state.url, &source.flow, &source.rules).await {
                        state.phase = CrawlPhase::Emitting;
                        return Ok(CrawlOutcome::Event(package));
                    }
                }
                None => {
                    if let Some(package) = self.next_section(&body, &state.url, &source.flow).await {
                        state.phase = CrawlPhase::Emitting;
                        return Ok(CrawlOutcome::Section(package));
                    }
                }
            }

            state.phase = CrawlPhase::Advancing;
            let Some(next_url) = self.paginator.next_page_url(&state.url, &body) else {
                return self.exhaust(&mut state, ExhaustReason::NoNextPage, pages_fetched);
            };
            if state.page + 1 > self.max_pages {
                return self.exhaust(&mut state, ExhaustReason::PageCap, pages_fetched);
            }
            state.advance(next_url);
        }
    }

    /// First section on the page the ledger hasn't seen, marked before it is returned
    async fn next_section(&self, body: &str, page_url: &str, flow: &FlowContext) -> Option<SectionPackage> {
        let ledger = self.pipeline.ledger();
        for section in self.sections.candidates(body, page_url, self.pipeline.today()) {
            match ledger.is_processed(&section.identifier, flow).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!("ledger read failed for section on {}: {}", page_url, e);
                    metrics::pipeline::ledger_error();
                    continue;
                }
            }
            if let Err(e) = ledger
                .mark_processed(&section.identifier, flow, flow.job_id.as_deref())
                .await
            {
                warn!("ledger write failed for section on {}, not emitting: {}", page_url, e);
                metrics::pipeline::ledger_error();
                continue;
            }

            info!("emitting provisional section ({}) from {}", section.rule.as_str(), page_url);
            metrics::crawl::section_emitted(section.rule.as_str());
            return Some(SectionPackage {
                html: section.content,
                rule: section.rule.as_str().to_string(),
                source_url: page_url.to_string(),
                section_identifier: section.identifier,
                import_timestamp: Utc::now(),
                flow_id: flow.flow_id.clone(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::FetchResponse;
    use crate::infra::{InMemoryLedger, TermListMatcher};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PageMap {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl PageMap {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl HttpClientPort for PageMap {
        async fn get(&self, url: &str, _options: &FetchOptions) -> FetchResponse {
            self.requests.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => FetchResponse::ok(200, body.clone()),
                None => FetchResponse::failed(404, "not found"),
            }
        }
    }

    fn orchestrator(http: Arc<PageMap>) -> CrawlOrchestrator {
        let pipeline = NormalizationPipeline::new(Arc::new(InMemoryLedger::new()), Arc::new(TermListMatcher))
            .with_today(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        CrawlOrchestrator::new(http, FetchOptions::default(), pipeline)
    }

    fn source(url: &str) -> SourceFlow {
        SourceFlow::new(FlowContext::new("test-flow"), url)
    }

    #[test]
    fn state_tracks_visits_without_fragments() {
        let mut state = CrawlState::new("https://a.example/events#top");
        assert!(state.visit());
        state.advance("https://a.example/events".into());
        assert_eq!(state.page, 2);
        assert!(!state.visit());
        assert_eq!(state.visited_count(), 1);
    }

    #[tokio::test]
    async fn missing_source_url_is_a_config_error() {
        let o = orchestrator(Arc::new(PageMap::default()));
        let err = o.crawl(&source("  ")).await.unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }

    #[tokio::test]
    async fn first_page_failure_vs_later_failure() {
        let o = orchestrator(Arc::new(PageMap::default()));
        match o.crawl(&source("https://a.example/events")).await.unwrap() {
            CrawlOutcome::Exhausted { reason, pages_fetched } => {
                assert_eq!(reason, ExhaustReason::FetchFailed);
                assert_eq!(pages_fetched, 0);
            }
            other => panic!("unexpected {:?}", other),
        }

        let http = Arc::new(PageMap::default().with(
            "https://a.example/events",
            r#"<html><body><a rel="next" href="/events?page=2">Next</a></body></html>"#,
        ));
        let o = orchestrator(http);
        match o.crawl(&source("https://a.example/events")).await.unwrap() {
            CrawlOutcome::Exhausted { reason, pages_fetched } => {
                assert_eq!(reason, ExhaustReason::PartialCrawl);
                assert_eq!(pages_fetched, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn two_page_cycle_is_detected() {
        let http = Arc::new(
            PageMap::default()
                .with("https://a.example/one", r#"<html><body><a rel="next" href="/two">Next</a></body></html>"#)
                .with("https://a.example/two", r#"<html><body><a rel="next" href="/one">Next</a></body></html>"#),
        );
        let o = orchestrator(http.clone());
        match o.crawl(&source("https://a.example/one")).await.unwrap() {
            CrawlOutcome::Exhausted { reason, pages_fetched } => {
                assert_eq!(reason, ExhaustReason::CycleDetected);
                assert_eq!(pages_fetched, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(http.requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn outcome_serializes_with_a_tag() {
        let outcome = CrawlOutcome::Exhausted {
            reason: ExhaustReason::PageCap,
            pages_fetched: 20,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "exhausted");
        assert_eq!(json["reason"], "page_cap");
        assert_eq!(json["pages_fetched"], 20);
    }
}
