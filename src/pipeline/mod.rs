//! Post-extraction normalization and dedup. Given an extractor's events, return
//! at most one eligible, not-yet-seen event as an `EventPackage`.

pub mod filters;
pub mod identity;
pub mod venue_override;

pub use filters::{FilterConfig, FilterRules, TitleSkipRules};
pub use venue_override::VenueOverride;

use crate::app::ports::{KeywordMatcher, ProcessedLedger, VenueResolver};
use crate::common::dates::{self, ReferenceDate};
use crate::common::types::{EventPackage, ExtractionResult, FlowContext, NormalizedEvent};
use crate::observability::metrics;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a candidate was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyTitle,
    SkipTitle,
    PastDate,
    KeywordFilter,
    AlreadyProcessed,
    LedgerError,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::EmptyTitle => "empty_title",
            Rejection::SkipTitle => "skip_title",
            Rejection::PastDate => "past_date",
            Rejection::KeywordFilter => "keyword_filter",
            Rejection::AlreadyProcessed => "already_processed",
            Rejection::LedgerError => "ledger_error",
        }
    }
}

/// Per-source settings the pipeline applies
#[derive(Debug, Clone, Default)]
pub struct SourceRules {
    pub filters: FilterRules,
    pub venue_override: Option<VenueOverride>,
}

pub struct NormalizationPipeline {
    ledger: Arc<dyn ProcessedLedger>,
    keywords: Arc<dyn KeywordMatcher>,
    venues: Option<Arc<dyn VenueResolver>>,
    reference: ReferenceDate,
}

impl NormalizationPipeline {
    /// "Today" is the current UTC date, read on every `process` call
    pub fn new(ledger: Arc<dyn ProcessedLedger>, keywords: Arc<dyn KeywordMatcher>) -> Self {
        Self {
            ledger,
            keywords,
            venues: None,
            reference: ReferenceDate::default(),
        }
    }

    pub fn with_venue_resolver(mut self, venues: Arc<dyn VenueResolver>) -> Self {
        self.venues = Some(venues);
        self
    }

    /// Read "today" in `zone` instead of UTC
    pub fn with_reference_zone(mut self, zone: Option<Tz>) -> Self {
        self.reference = ReferenceDate::in_zone(zone);
        self
    }

    /// Pin the reference date past-event checks compare against
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.reference = self.reference.with_fixed(today);
        self
    }

    pub fn reference(&self) -> ReferenceDate {
        self.reference
    }

    pub fn today(&self) -> NaiveDate {
        self.reference.today()
    }

    pub fn ledger(&self) -> &Arc<dyn ProcessedLedger> {
        &self.ledger
    }

    /// Steps 1-4: checks that need no ledger round-trip
    fn prefilter(&self, event: &NormalizedEvent, rules: &FilterRules, today: NaiveDate) -> Result<(), Rejection> {
        if event.title.trim().is_empty() {
            return Err(Rejection::EmptyTitle);
        }
        if rules.skip_titles.matches(&event.title) {
            return Err(Rejection::SkipTitle);
        }
        if dates::is_past(event.start_date.as_deref(), today) {
            return Err(Rejection::PastDate);
        }
        let text = event.searchable_text();
        let include = rules.include_keywords.trim();
        if !include.is_empty() && !self.keywords.include_match(&text, include) {
            return Err(Rejection::KeywordFilter);
        }
        let exclude = rules.exclude_keywords.trim();
        if !exclude.is_empty() && self.keywords.exclude_match(&text, exclude) {
            return Err(Rejection::KeywordFilter);
        }
        Ok(())
    }

    /// Steps 5-7: identity, ledger check, mark before emit. Ledger failures skip
    /// the candidate.
    async fn claim(&self, event: &NormalizedEvent, flow: &FlowContext) -> Result<String, Rejection> {
        let identity = identity::identity_of(event);
        match self.ledger.is_processed(&identity, flow).await {
            Ok(true) => return Err(Rejection::AlreadyProcessed),
            Ok(false) => {}
            Err(e) => {
                warn!("ledger read failed for {:?}: {}", event.title, e);
                metrics::pipeline::ledger_error();
                return Err(Rejection::LedgerError);
            }
        }
        if let Err(e) = self
            .ledger
            .mark_processed(&identity, flow, flow.job_id.as_deref())
            .await
        {
            warn!("ledger write failed for {:?}, not emitting: {}", event.title, e);
            metrics::pipeline::ledger_error();
            return Err(Rejection::LedgerError);
        }
        Ok(identity)
    }

    /// Run every candidate through the pipeline in order; the first eligible one is
    /// packaged and the rest are left for later invocations.
    pub async fn process(
        &self,
        result: ExtractionResult,
        source_url: &str,
        flow: &FlowContext,
        rules: &SourceRules,
    ) -> Option<EventPackage> {
        let method = result.method;
        let total = result.events.len();
        let today = self.today();
        for (index, mut event) in result.events.into_iter().enumerate() {
            if let Err(reason) = self.prefilter(&event, &rules.filters, today) {
                debug!("candidate {}/{} {:?} rejected: {}", index + 1, total, event.title, reason.as_str());
                metrics::pipeline::candidate_rejected(reason.as_str());
                continue;
            }
            let identity = match self.claim(&event, flow).await {
                Ok(identity) => identity,
                Err(reason) => {
                    debug!("candidate {}/{} {:?} rejected: {}", index + 1, total, event.title, reason.as_str());
                    metrics::pipeline::candidate_rejected(reason.as_str());
                    continue;
                }
            };

            if let Some(venue) = rules
                .venue_override
                .as_ref()
                .and_then(|o| o.resolve(self.venues.as_deref()))
            {
                event.apply_venue(&venue);
            }
            if event.source_url.is_none() {
                event.source_url = Some(source_url.to_string());
            }

            info!("emitting {:?} ({}) from {}", event.title, method, source_url);
            metrics::pipeline::event_emitted(method);
            let raw_source = event.raw.clone().unwrap_or(Value::Null);
            return Some(EventPackage {
                event,
                raw_source,
                extraction_method: method.to_string(),
                source_url: source_url.to_string(),
                import_timestamp: Utc::now(),
                event_identifier: identity,
                flow_id: flow.flow_id.clone(),
            });
        }
        None
    }
}
