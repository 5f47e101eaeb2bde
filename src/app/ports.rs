use crate::common::error::Result;
use crate::common::types::{FlowContext, VenueFields};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

// Fetch-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Never errors: transport failures come back as `success == false` with `error` set.
    async fn get(&self, url: &str, options: &FetchOptions) -> FetchResponse;
}

#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    /// Send a browser-like Accept/Accept-Language/User-Agent set to reduce bot blocking
    pub browser_mode: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::common::constants::DEFAULT_TIMEOUT_SECS),
            headers: HashMap::new(),
            browser_mode: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FetchResponse {
    pub success: bool,
    pub status_code: u16,
    pub body: String,
    pub error: Option<String>,
}

impl FetchResponse {
    pub fn ok(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code,
            body: body.into(),
            error: None,
        }
    }

    pub fn failed(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            body: String::new(),
            error: Some(error.into()),
        }
    }

    /// Successful with a non-blank body
    pub fn has_content(&self) -> bool {
        self.success && !self.body.trim().is_empty()
    }
}

// Dedup ledger, owned by the caller
#[async_trait]
pub trait ProcessedLedger: Send + Sync {
    async fn is_processed(&self, identity: &str, flow: &FlowContext) -> Result<bool>;
    async fn mark_processed(&self, identity: &str, flow: &FlowContext, job_id: Option<&str>) -> Result<()>;
}

/// Comma-separated keyword tests used by the include/exclude filters
pub trait KeywordMatcher: Send + Sync {
    fn include_match(&self, text: &str, terms: &str) -> bool;
    fn exclude_match(&self, text: &str, terms: &str) -> bool;
}

/// Optional source of static venue overrides keyed by taxonomy id
pub trait VenueResolver: Send + Sync {
    fn resolve_venue_by_id(&self, id: u64) -> Option<VenueFields>;
}
