use super::json_event::{find_event_arrays, map_event_object};
use super::{script_bodies, EventExtractor};
use crate::common::constants::NEXT_DATA;
use crate::common::dates;
use crate::common::types::NormalizedEvent;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Next.js pages: `<script id="__NEXT_DATA__">` holds the page props, events are
/// wherever the site put them.
pub struct NextDataExtractor;

impl NextDataExtractor {
    /// A site-wide zone sometimes sits in the props (`timezone`, `timeZone`)
    fn feed_zone(data: &Value) -> Option<chrono_tz::Tz> {
        ["/props/pageProps/timezone", "/props/pageProps/timeZone", "/props/pageProps/site/timezone"]
            .iter()
            .find_map(|p| data.pointer(p).and_then(Value::as_str))
            .and_then(dates::parse_timezone)
    }
}

#[async_trait]
impl EventExtractor for NextDataExtractor {
    fn identifier(&self) -> &'static str {
        NEXT_DATA
    }

    fn can_handle(&self, content: &str) -> bool {
        content.contains("__NEXT_DATA__")
    }

    async fn extract(&self, content: &str, source_url: &str) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        for body in script_bodies(content, "script#__NEXT_DATA__") {
            let Ok(data) = serde_json::from_str::<Value>(&body) else {
                debug!("next_data: unparseable blob on {}", source_url);
                continue;
            };
            let zone = Self::feed_zone(&data);
            for items in find_event_arrays(&data) {
                events.extend(items.iter().filter_map(|item| map_event_object(item, zone)));
            }
        }
        events
    }
}
