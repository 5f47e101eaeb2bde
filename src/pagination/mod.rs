//! Next-page resolution. Strategies are tried in order and the first one that
//! claims the page decides; a strategy answering `None` ends pagination.

pub mod html;
pub mod json;

pub use html::HtmlPaginator;
pub use json::JsonPaginator;

use tracing::debug;
use url::Url;

pub trait Paginator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy understands the page
    fn can_paginate(&self, url: &str, content: &str) -> bool;

    /// Absolute URL of the next page, or `None` when there is none (or it is unusable)
    fn next_page_url(&self, current_url: &str, content: &str) -> Option<String>;
}

/// Ordered strategies: JSON API metadata first, then HTML links
pub struct PaginatorChain {
    strategies: Vec<Box<dyn Paginator>>,
}

impl PaginatorChain {
    pub fn new(strategies: Vec<Box<dyn Paginator>>) -> Self {
        Self { strategies }
    }

    pub fn standard() -> Self {
        Self::new(vec![Box::new(JsonPaginator), Box::new(HtmlPaginator)])
    }

    pub fn next_page_url(&self, current_url: &str, content: &str) -> Option<String> {
        let strategy = self.strategies.iter().find(|s| s.can_paginate(current_url, content))?;
        let next = strategy.next_page_url(current_url, content);
        debug!("{} paginator: {} -> {:?}", strategy.name(), current_url, next);
        next
    }
}

impl Default for PaginatorChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolve an href against `base` (absolute, protocol-relative, root-relative or
/// path-relative). Only http(s) results are returned.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(base).ok()?;
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// `url` without its fragment, for "same page" comparisons
pub(crate) fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}
