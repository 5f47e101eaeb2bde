use super::{resolve_href, strip_fragment, Paginator};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

static REL_NEXT_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[rel~="next"][href]"#).expect("valid rel=next selector"));
static REL_NEXT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="next"][href]"#).expect("valid link rel=next selector"));
static NEXT_CLASS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "a.next[href], a.pagination-next[href], a.page-next[href], \
         .next > a[href], .pagination-next a[href], .page-next a[href], \
         a[class*=\"next-page\"][href], a[class*=\"nav-next\"][href]",
    )
    .expect("valid next class selector")
});
static PAGINATION_ANCHORS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "[class*=\"pagination\"] a[href], [class*=\"pager\"] a[href], [class*=\"paging\"] a[href], \
         [class*=\"page-nav\"] a[href], nav[aria-label*=\"agination\"] a[href], [role=\"navigation\"] a[href]",
    )
    .expect("valid pagination anchors selector")
});

const NEXT_SYMBOLS: &[&str] = &[">", ">>", "»", "›", "→"];

fn looks_like_next(el: &ElementRef) -> bool {
    let text = el.text().collect::<String>().trim().to_lowercase();
    let aria = el.value().attr("aria-label").unwrap_or_default().to_lowercase();
    let title = el.value().attr("title").unwrap_or_default().to_lowercase();
    text.starts_with("next")
        || NEXT_SYMBOLS.contains(&text.as_str())
        || text.ends_with('»')
        || text.ends_with('›')
        || text.ends_with('→')
        || aria.contains("next")
        || title.contains("next")
}

/// Markup pagination via rel=next links, class names or "Next"/"»" anchors
pub struct HtmlPaginator;

impl HtmlPaginator {
    /// The first next-link href on the page, in heuristic order
    pub fn find_candidate(content: &str) -> Option<String> {
        let document = Html::parse_document(content);
        let href = |el: ElementRef| el.value().attr("href").map(|h| h.trim().to_string());
        document
            .select(&REL_NEXT_ANCHOR)
            .next()
            .and_then(href)
            .or_else(|| document.select(&REL_NEXT_LINK).next().and_then(href))
            .or_else(|| document.select(&NEXT_CLASS).next().and_then(href))
            .or_else(|| {
                document
                    .select(&PAGINATION_ANCHORS)
                    .find(looks_like_next)
                    .and_then(href)
            })
    }

    /// Validate and resolve a candidate. Anything unusable ends pagination.
    fn accept(current_url: &str, href: &str) -> Option<String> {
        let lower = href.to_lowercase();
        if ["javascript:", "mailto:", "tel:"].iter().any(|s| lower.starts_with(s)) {
            return None;
        }
        if href.starts_with('#') {
            return None;
        }
        let resolved = resolve_href(current_url, href)?;
        let current = Url::parse(current_url).ok()?;
        let next = Url::parse(&resolved).ok()?;
        if current.host_str() != next.host_str() {
            debug!("html paginator: refusing cross-host next link {}", resolved);
            return None;
        }
        if strip_fragment(&resolved) == strip_fragment(current.as_str()) {
            return None;
        }
        Some(resolved)
    }
}

impl Paginator for HtmlPaginator {
    fn name(&self) -> &'static str {
        "html"
    }

    fn can_paginate(&self, _url: &str, _content: &str) -> bool {
        true
    }

    fn next_page_url(&self, current_url: &str, content: &str) -> Option<String> {
        let href = Self::find_candidate(content)?;
        Self::accept(current_url, &href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = "https://club.example/events/?page=1";

    fn next(content: &str) -> Option<String> {
        HtmlPaginator.next_page_url(CURRENT, content)
    }

    #[test]
    fn rel_next_wins_over_heuristics() {
        let html = r#"<div class="pagination"><a href="?page=9">Next</a></div><a rel="next nofollow" href="?page=2">2</a>"#;
        assert_eq!(next(html).as_deref(), Some("https://club.example/events/?page=2"));
    }

    #[test]
    fn link_and_class_heuristics() {
        assert_eq!(
            next(r#"<head><link rel="next" href="/events/page/2/"></head>"#).as_deref(),
            Some("https://club.example/events/page/2/")
        );
        assert_eq!(
            next(r#"<li class="pagination-next"><a href="//club.example/events/?page=2">Later</a></li>"#).as_deref(),
            Some("https://club.example/events/?page=2")
        );
    }

    #[test]
    fn text_and_aria_heuristics_inside_pagination() {
        assert_eq!(
            next(r#"<nav class="pager"><a href="?page=0">Prev</a><a href="?page=2">»</a></nav>"#).as_deref(),
            Some("https://club.example/events/?page=2")
        );
        assert_eq!(
            next(r#"<div class="paging"><a aria-label="Next page" href="?page=2"><svg></svg></a></div>"#).as_deref(),
            Some("https://club.example/events/?page=2")
        );
        assert_eq!(
            next(r#"<ul class="pagination"><li><a href="?page=0">1</a></li><li><a href="?page=2">&gt;&gt;</a></li></ul>"#)
                .as_deref(),
            Some("https://club.example/events/?page=2")
        );
        assert_eq!(
            next(r#"<div role="navigation"><a href="/events/?page=0">Earlier</a><a href="/events/?page=2">More shows →</a></div>"#)
                .as_deref(),
            Some("https://club.example/events/?page=2")
        );
        // outside a pagination container a bare "Next" is not trusted
        assert_eq!(next(r#"<a href="?page=2">Next</a>"#), None);
    }

    #[test]
    fn unusable_candidates_end_pagination() {
        assert_eq!(next(r#"<a rel="next" href="javascript:void(0)">Next</a>"#), None);
        assert_eq!(next(r#"<a rel="next" href="MAILTO:x@y.z">Next</a>"#), None);
        assert_eq!(next(r#"<a rel="next" href="tel:555">Next</a>"#), None);
        assert_eq!(next(r##"<a rel="next" href="#more">Next</a>"##), None);
        assert_eq!(next(r#"<a rel="next" href="https://other.example/events?page=2">Next</a>"#), None);
        assert_eq!(next(r#"<a rel="next" href="?page=1#top">Next</a>"#), None);
        // only the first candidate is considered
        assert_eq!(
            next(r#"<a rel="next" href="javascript:;">Next</a><a rel="next" href="?page=2">Next</a>"#),
            None
        );
    }
}
