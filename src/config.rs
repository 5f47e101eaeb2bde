use crate::app::ports::FetchOptions;
use crate::common::constants::{DEFAULT_MAX_PAGES, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::common::dates;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{FlowContext, VenueFields};
use crate::crawl::SourceFlow;
use crate::infra::StaticVenueResolver;
use crate::pipeline::{FilterConfig, FilterRules, SourceRules, VenueOverride};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "EVENT_SCRAPER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Static venues for `venue_override = { venue_id = N }`, keyed by id
    #[serde(default)]
    pub venues: HashMap<String, VenueFields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub browser_mode: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// IANA zone that decides what "today" is for past-event filtering; UTC when unset
    #[serde(default)]
    pub reference_timezone: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            browser_mode: true,
            user_agent: None,
            reference_timezone: None,
        }
    }
}

/// No path means an in-memory ledger that forgets everything on exit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub flow_id: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub venue_override: Option<VenueOverride>,
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    pub fn to_flow(&self, job_id: Option<&str>) -> SourceFlow {
        let mut flow = FlowContext::new(self.flow_id.clone());
        if let Some(job) = job_id {
            flow = flow.with_job(job);
        }
        SourceFlow::new(flow, self.source_url.clone()).with_rules(SourceRules {
            filters: FilterRules::from(&self.filters),
            venue_override: self.venue_override.clone(),
        })
    }
}

impl Config {
    /// Load from `$EVENT_SCRAPER_CONFIG` (a `.env` file is honoured), else `config.toml`
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.crawl.max_pages == 0 {
            return Err(ScraperError::Config("crawl.max_pages must be at least 1".into()));
        }
        if let Some(zone) = &self.crawl.reference_timezone {
            if dates::parse_timezone(zone).is_none() {
                return Err(ScraperError::Config(format!("unknown reference_timezone '{}'", zone)));
            }
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.flow_id.trim().is_empty() {
                return Err(ScraperError::MissingField("sources.flow_id".into()));
            }
            if !seen.insert(source.flow_id.as_str()) {
                return Err(ScraperError::Config(format!("duplicate flow_id '{}'", source.flow_id)));
            }
        }
        self.venue_ids().map(|_| ())
    }

    fn venue_ids(&self) -> Result<HashMap<u64, VenueFields>> {
        self.venues
            .iter()
            .map(|(key, venue)| {
                key.trim()
                    .parse::<u64>()
                    .map(|id| (id, venue.clone()))
                    .map_err(|_| ScraperError::Config(format!("venue key '{}' is not a numeric id", key)))
            })
            .collect()
    }

    pub fn source(&self, flow_id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.flow_id == flow_id)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.crawl.timeout_seconds),
            browser_mode: self.crawl.browser_mode,
            ..Default::default()
        }
    }

    pub fn user_agent(&self) -> &str {
        self.crawl.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Current date in the reference zone
    /// Zone the reference "today" is read in; UTC when unset
    pub fn reference_zone(&self) -> Option<Tz> {
        self.crawl.reference_timezone.as_deref().and_then(dates::parse_timezone)
    }

    pub fn venue_resolver(&self) -> Result<StaticVenueResolver> {
        Ok(StaticVenueResolver::new(self.venue_ids()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::VenueResolver;

    const SAMPLE: &str = r#"
[crawl]
max_pages = 5
timeout_seconds = 10
reference_timezone = "America/Los_Angeles"

[ledger]
path = "data/ledger.db"

[[sources]]
flow_id = "sunset"
source_url = "https://sunset.example/events"
include_keywords = "jazz, blues"
skip_titles = ["Closed", "re:^private"]
venue_override = { venue_id = 12 }

[[sources]]
flow_id = "neumos"
source_url = "https://neumos.example/"
enabled = false
venue_override = { name = "Neumos", city = "Seattle" }

[venues.12]
name = "Sunset Tavern"
city = "Seattle"
"#;

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.crawl.max_pages, 5);
        assert_eq!(config.fetch_options().timeout, Duration::from_secs(10));
        assert!(config.crawl.browser_mode);
        assert_eq!(config.reference_zone(), Some(chrono_tz::America::Los_Angeles));
        assert_eq!(config.ledger.path, Some(PathBuf::from("data/ledger.db")));

        let sunset = config.source("sunset").unwrap();
        assert_eq!(sunset.filters.include_keywords, "jazz, blues");
        assert_eq!(sunset.filters.skip_titles.len(), 2);
        assert_eq!(sunset.venue_override, Some(VenueOverride::VenueId { venue_id: 12 }));

        let flow = sunset.to_flow(Some("job-9"));
        assert_eq!(flow.flow.job_id.as_deref(), Some("job-9"));
        assert!(flow.rules.filters.skip_titles.matches("Private Party"));

        let enabled: Vec<&str> = config.enabled_sources().map(|s| s.flow_id.as_str()).collect();
        assert_eq!(enabled, vec!["sunset"]);

        let resolver = config.venue_resolver().unwrap();
        assert_eq!(
            resolver.resolve_venue_by_id(12).and_then(|v| v.name).as_deref(),
            Some("Sunset Tavern")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.crawl.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(config.crawl.timeout_seconds, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
        assert!(config.ledger.path.is_none());
        assert!(config.reference_zone().is_none());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        let bad_zone = "[crawl]\nreference_timezone = \"Mars/Olympus\"";
        assert!(matches!(Config::from_toml_str(bad_zone), Err(ScraperError::Config(_))));

        let dup = "[[sources]]\nflow_id = \"a\"\n[[sources]]\nflow_id = \"a\"";
        assert!(matches!(Config::from_toml_str(dup), Err(ScraperError::Config(_))));

        let bad_venue = "[venues.main]\nname = \"x\"";
        assert!(matches!(Config::from_toml_str(bad_venue), Err(ScraperError::Config(_))));

        assert!(matches!(Config::from_toml_str("[crawl]\nmax_pages = 0"), Err(ScraperError::Config(_))));
    }

    #[test]
    fn load_from_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert!(matches!(
            Config::load_from(dir.path().join("missing.toml")),
            Err(ScraperError::Config(_))
        ));
    }
}
