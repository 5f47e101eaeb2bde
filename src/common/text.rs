//! Free-text sanitization shared by every extractor. Upstream markup is untrusted,
//! so titles and descriptions go through `clean_text` before they reach a record.

use scraper::{ElementRef, Html};

/// Collapse runs of whitespace (including non-breaking spaces) to a single space and trim.
pub fn collapse_whitespace(input: &str) -> String {
    input
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip tags, decode entities and collapse whitespace.
pub fn clean_text(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return collapse_whitespace(input);
    }
    let fragment = Html::parse_fragment(input);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// `clean_text` that maps empty results to `None`
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input.map(clean_text).filter(|s| !s.is_empty())
}

/// Visible text of an element, whitespace-collapsed
pub fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Trimmed, non-empty owned string
pub fn non_empty(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        assert_eq!(
            clean_text("<p>Rock &amp; Roll<br/>Night</p>\n\n  <script></script>"),
            "Rock & Roll Night"
        );
    }

    #[test]
    fn collapses_whitespace_without_markup() {
        assert_eq!(clean_text("  Doors\t 7pm \u{a0} Show 8pm "), "Doors 7pm Show 8pm");
    }

    #[test]
    fn clean_optional_drops_empty_results() {
        assert_eq!(clean_optional(Some("<span> </span>")), None);
        assert_eq!(clean_optional(None), None);
        assert_eq!(clean_optional(Some(" ok ")), Some("ok".to_string()));
    }
}
