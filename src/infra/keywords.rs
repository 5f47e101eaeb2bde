use crate::app::ports::KeywordMatcher;

/// Case-insensitive substring matching over comma-separated term lists.
/// Blank terms are ignored; a list with no usable terms matches nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermListMatcher;

impl TermListMatcher {
    fn terms(terms: &str) -> impl Iterator<Item = String> + '_ {
        terms
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }

    fn any_term(text: &str, terms: &str) -> bool {
        let haystack = text.to_lowercase();
        Self::terms(terms).any(|term| haystack.contains(&term))
    }
}

impl KeywordMatcher for TermListMatcher {
    fn include_match(&self, text: &str, terms: &str) -> bool {
        Self::any_term(text, terms)
    }

    fn exclude_match(&self, text: &str, terms: &str) -> bool {
        Self::any_term(text, terms)
    }
}
