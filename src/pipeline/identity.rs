use crate::common::text::collapse_whitespace;
use crate::common::types::NormalizedEvent;
use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_part(part: Option<&str>) -> String {
    collapse_whitespace(part.unwrap_or_default()).to_lowercase()
}

/// Identity of an event: the normalized `title|startDate|venueName` triple
pub fn event_identity(title: &str, start_date: Option<&str>, venue_name: Option<&str>) -> String {
    let mut s = String::new();
    s.push_str(&normalize_part(Some(title)));
    s.push('|');
    s.push_str(&normalize_part(start_date));
    s.push('|');
    s.push_str(&normalize_part(venue_name));
    sha256_hex(&s)
}

pub fn identity_of(event: &NormalizedEvent) -> String {
    event_identity(&event.title, event.start_date.as_deref(), event.venue_name.as_deref())
}

/// Identity of a provisional section: page URL plus the section's raw content
pub fn section_identity(source_url: &str, content: &str) -> String {
    let mut s = String::with_capacity(source_url.len() + content.len());
    s.push_str(source_url);
    s.push_str(content);
    sha256_hex(&s)
}

/// Visited-set key for a crawl URL; the fragment never changes the page
pub fn url_hash(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    sha256_hex(without_fragment.trim())
}
