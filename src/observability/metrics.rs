//! Simple metrics module for the event scraper
//!
//! Metric names live in one enum so call sites never spell them out; recording
//! functions are grouped by the phase that emits them.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Fetch
    FetchRequestsSuccess,
    FetchRequestsError,
    FetchRequestDuration,
    FetchPayloadBytes,

    // Extraction
    ExtractorMatched,
    ExtractorEventsExtracted,

    // Pipeline
    PipelineCandidatesRejected,
    PipelineEventsEmitted,
    PipelineLedgerErrors,

    // Crawl
    CrawlPagesFetched,
    CrawlSectionsEmitted,
    CrawlExhausted,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchRequestsSuccess => "events_fetch_requests_success_total",
            MetricName::FetchRequestsError => "events_fetch_requests_error_total",
            MetricName::FetchRequestDuration => "events_fetch_request_duration_seconds",
            MetricName::FetchPayloadBytes => "events_fetch_payload_bytes",
            MetricName::ExtractorMatched => "events_extractor_matched_total",
            MetricName::ExtractorEventsExtracted => "events_extractor_events_extracted_total",
            MetricName::PipelineCandidatesRejected => "events_pipeline_candidates_rejected_total",
            MetricName::PipelineEventsEmitted => "events_pipeline_events_emitted_total",
            MetricName::PipelineLedgerErrors => "events_pipeline_ledger_errors_total",
            MetricName::CrawlPagesFetched => "events_crawl_pages_fetched_total",
            MetricName::CrawlSectionsEmitted => "events_crawl_sections_emitted_total",
            MetricName::CrawlExhausted => "events_crawl_exhausted_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::FetchRequestsSuccess,
            MetricName::FetchRequestsError,
            MetricName::FetchRequestDuration,
            MetricName::FetchPayloadBytes,
            MetricName::ExtractorMatched,
            MetricName::ExtractorEventsExtracted,
            MetricName::PipelineCandidatesRejected,
            MetricName::PipelineEventsEmitted,
            MetricName::PipelineLedgerErrors,
            MetricName::CrawlPagesFetched,
            MetricName::CrawlSectionsEmitted,
            MetricName::CrawlExhausted,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Returns the handle used to render a snapshot.
pub fn init() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    info!("Metrics system initialized");
    Ok(handle)
}

// ============================================================================
// Fetch Metrics
// ============================================================================

pub mod fetch {
    use super::MetricName;

    pub fn request_success(bytes: usize) {
        ::metrics::counter!(MetricName::FetchRequestsSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::FetchPayloadBytes.as_str()).record(bytes as f64);
    }

    pub fn request_error() {
        ::metrics::counter!(MetricName::FetchRequestsError.as_str()).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::FetchRequestDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Extraction Metrics
// ============================================================================

pub mod extract {
    use super::MetricName;

    pub fn extractor_matched(method: &'static str, events: usize) {
        ::metrics::counter!(MetricName::ExtractorMatched.as_str(), "method" => method).increment(1);
        ::metrics::counter!(MetricName::ExtractorEventsExtracted.as_str(), "method" => method)
            .increment(events as u64);
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    pub fn candidate_rejected(reason: &'static str) {
        ::metrics::counter!(MetricName::PipelineCandidatesRejected.as_str(), "reason" => reason)
            .increment(1);
    }

    pub fn event_emitted(method: &'static str) {
        ::metrics::counter!(MetricName::PipelineEventsEmitted.as_str(), "method" => method).increment(1);
    }

    pub fn ledger_error() {
        ::metrics::counter!(MetricName::PipelineLedgerErrors.as_str()).increment(1);
    }
}

// ============================================================================
// Crawl Metrics
// ============================================================================

pub mod crawl {
    use super::MetricName;

    pub fn page_fetched() {
        ::metrics::counter!(MetricName::CrawlPagesFetched.as_str()).increment(1);
    }

    pub fn section_emitted(rule: &'static str) {
        ::metrics::counter!(MetricName::CrawlSectionsEmitted.as_str(), "rule" => rule).increment(1);
    }

    pub fn exhausted(reason: &'static str) {
        ::metrics::counter!(MetricName::CrawlExhausted.as_str(), "reason" => reason).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        let names: Vec<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.iter().all(|n| n.starts_with("events_")));
    }

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        fetch::request_success(10);
        extract::extractor_matched("jsonld", 2);
        crawl::exhausted("no_next_page");
    }
}
