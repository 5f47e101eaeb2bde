use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Titles that are never events ("Closed", "Private Event", ...).
///
/// Entries are case-insensitive exact titles, `contains:<text>` substrings, or
/// `re:<pattern>` regular expressions.
#[derive(Debug, Clone, Default)]
pub struct TitleSkipRules {
    exact: Vec<String>,
    substrings: Vec<String>,
    patterns: Vec<Regex>,
}

impl TitleSkipRules {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut rules = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if let Some(pattern) = entry.strip_prefix("re:") {
                match RegexBuilder::new(pattern.trim()).case_insensitive(true).build() {
                    Ok(re) => rules.patterns.push(re),
                    Err(e) => warn!("ignoring invalid skip-title pattern {:?}: {}", pattern, e),
                }
            } else if let Some(text) = entry.strip_prefix("contains:") {
                let text = text.trim().to_lowercase();
                if !text.is_empty() {
                    rules.substrings.push(text);
                }
            } else {
                rules.exact.push(entry.to_lowercase());
            }
        }
        rules
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.substrings.is_empty() && self.patterns.is_empty()
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.trim();
        let lower = title.to_lowercase();
        self.exact.iter().any(|t| *t == lower)
            || self.substrings.iter().any(|s| lower.contains(s.as_str()))
            || self.patterns.iter().any(|re| re.is_match(title))
    }
}

/// Per-source filter configuration as written in `[[sources]]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub include_keywords: String,
    #[serde(default)]
    pub exclude_keywords: String,
    #[serde(default)]
    pub skip_titles: Vec<String>,
}

/// Compiled filters applied by the pipeline
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    pub include_keywords: String,
    pub exclude_keywords: String,
    pub skip_titles: TitleSkipRules,
}

impl From<&FilterConfig> for FilterRules {
    fn from(config: &FilterConfig) -> Self {
        Self {
            include_keywords: config.include_keywords.clone(),
            exclude_keywords: config.exclude_keywords.clone(),
            skip_titles: TitleSkipRules::parse(&config.skip_titles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_substring_and_regex_rules() {
        let rules = TitleSkipRules::parse(&["Closed", "contains:private", "re:^sold out\\b", "re:([", ""]);
        assert!(rules.matches("  CLOSED "));
        assert!(!rules.matches("Closed Captioned Film"));
        assert!(rules.matches("A Private Party"));
        assert!(rules.matches("SOLD OUT - Night Owls"));
        assert!(!rules.matches("Not sold out"));
        assert!(!rules.matches("Jazz Night"));
    }

    #[test]
    fn empty_rules_match_nothing() {
        let rules = TitleSkipRules::parse::<&str>(&[]);
        assert!(rules.is_empty());
        assert!(!rules.matches("Closed"));
    }
}
