/// Extractor identifiers. These end up as `extraction_method` on emitted packages
/// and as the `method` label on extractor metrics, so keep them stable.
pub const WIX_EVENTS: &str = "wix_events";
pub const SQUARESPACE: &str = "squarespace";
pub const EVENTBRITE: &str = "eventbrite";
pub const DICE: &str = "dice";
pub const BANDSINTOWN: &str = "bandsintown";
pub const TRIBE_EVENTS: &str = "tribe_events";
pub const NEXT_DATA: &str = "next_data";
pub const JSON_LD: &str = "jsonld";
pub const MICRODATA: &str = "microdata";
pub const ICS: &str = "ics";
pub const GOOGLE_CALENDAR: &str = "google_calendar";
pub const ICAL_FEED: &str = "ical_feed";
pub const WORDPRESS_REST: &str = "wordpress_rest";
pub const REST_JSON: &str = "rest_json";

// Crawl bounds
pub const DEFAULT_MAX_PAGES: u32 = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sections shorter than this (serialized markup) are treated as near-empty matches.
pub const MIN_SECTION_CHARS: usize = 80;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
pub const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Get all extractor identifiers in registry priority order
pub fn get_extractor_order() -> Vec<&'static str> {
    vec![
        WIX_EVENTS,
        SQUARESPACE,
        EVENTBRITE,
        DICE,
        BANDSINTOWN,
        TRIBE_EVENTS,
        NEXT_DATA,
        JSON_LD,
        MICRODATA,
        ICS,
        GOOGLE_CALENDAR,
        ICAL_FEED,
        WORDPRESS_REST,
        REST_JSON,
    ]
}
