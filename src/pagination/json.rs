use super::Paginator;
use crate::extractors::{looks_like_json, parse_json_document};
use serde_json::Value;
use url::Url;

const TOTAL_PAGES_POINTERS: &[&str] = &["/total_pages", "/totalPages", "/meta/total_pages", "/pagination/total_pages"];
const CURRENT_PAGE_POINTERS: &[&str] = &["/page", "/current_page", "/currentPage"];

/// JSON API responses that report `total_pages`
pub struct JsonPaginator;

fn as_page_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_api_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let query = url.query().unwrap_or_default().to_lowercase();
    path.contains("/wp-json/")
        || path.contains("/api/")
        || path.ends_with(".json")
        || query.contains("format=json")
        || url.query_pairs().any(|(k, _)| k == "page")
}

fn page_param(url: &Url) -> Option<u64> {
    url.query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.trim().parse().ok())
}

/// Set `page` in the query, keeping its position when already present
pub(crate) fn with_page(url: &Url, page: u64) -> Url {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    match pairs.iter_mut().find(|(k, _)| k == "page") {
        Some(pair) => pair.1 = page.to_string(),
        None => pairs.push(("page".to_string(), page.to_string())),
    }
    let mut next = url.clone();
    next.query_pairs_mut().clear().extend_pairs(pairs);
    next
}

impl JsonPaginator {
    fn total_pages(data: &Value) -> Option<u64> {
        TOTAL_PAGES_POINTERS
            .iter()
            .find_map(|p| data.pointer(p).and_then(as_page_number))
    }
}

impl Paginator for JsonPaginator {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_paginate(&self, url: &str, content: &str) -> bool {
        if !looks_like_json(content) {
            return false;
        }
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        is_api_url(&url)
            && parse_json_document(content)
                .as_ref()
                .and_then(Self::total_pages)
                .is_some()
    }

    fn next_page_url(&self, current_url: &str, content: &str) -> Option<String> {
        let url = Url::parse(current_url).ok()?;
        let data = parse_json_document(content)?;
        let total = Self::total_pages(&data)?;
        let current = CURRENT_PAGE_POINTERS
            .iter()
            .find_map(|p| data.pointer(p).and_then(as_page_number))
            .or_else(|| page_param(&url))
            .unwrap_or(1);
        if current >= total {
            return None;
        }
        Some(with_page(&url, current + 1).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_only_api_urls_with_total_pages() {
        let p = JsonPaginator;
        let body = r#"{"total_pages": 4, "events": []}"#;
        assert!(p.can_paginate("https://x.example/wp-json/tribe/events/v1/events", body));
        assert!(p.can_paginate("https://x.example/events?format=json", body));
        assert!(!p.can_paginate("https://x.example/events", body));
        assert!(!p.can_paginate("https://x.example/api/events", r#"{"events": []}"#));
        assert!(!p.can_paginate("https://x.example/api/events", "<html></html>"));
    }

    #[test]
    fn current_page_from_body_then_url_then_one() {
        let p = JsonPaginator;
        assert_eq!(
            p.next_page_url("https://x.example/api/events?page=9", r#"{"meta": {"total_pages": 5}, "current_page": 2}"#)
                .as_deref(),
            Some("https://x.example/api/events?page=3")
        );
        assert_eq!(
            p.next_page_url("https://x.example/api/events?city=sea&page=2&sort=date", r#"{"totalPages": "3"}"#)
                .as_deref(),
            Some("https://x.example/api/events?city=sea&page=3&sort=date")
        );
        assert_eq!(
            p.next_page_url("https://x.example/api/events", r#"{"pagination": {"total_pages": 2}}"#)
                .as_deref(),
            Some("https://x.example/api/events?page=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let p = JsonPaginator;
        assert_eq!(p.next_page_url("https://x.example/api/events?page=3", r#"{"total_pages": 3}"#), None);
        assert_eq!(p.next_page_url("https://x.example/api/events", r#"{"total_pages": 0}"#), None);
    }
}
