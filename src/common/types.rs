use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw item payload as read by an extractor (a JSON-LD node, an ICS block, a feed object)
pub type RawEventData = serde_json::Value;

/// The canonical event record every extractor produces.
///
/// Dates are `YYYY-MM-DD` and times are local wall-clock `HH:MM`; the zone travels
/// separately in `venue_timezone` as an IANA identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_coordinates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Source item the record was built from; carried into the package, never hashed
    #[serde(skip)]
    pub raw: Option<RawEventData>,
}

impl NormalizedEvent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_raw(mut self, raw: RawEventData) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Title and description joined, used for keyword filtering
    pub fn searchable_text(&self) -> String {
        match &self.description {
            Some(desc) => format!("{} {}", self.title, desc),
            None => self.title.clone(),
        }
    }

    /// Overwrite venue fields with every non-empty field of `venue`
    pub fn apply_venue(&mut self, venue: &VenueFields) {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *target = Some(v.to_string());
            }
        }
        set(&mut self.venue_name, &venue.name);
        set(&mut self.venue_address, &venue.address);
        set(&mut self.venue_city, &venue.city);
        set(&mut self.venue_state, &venue.state);
        set(&mut self.venue_zip, &venue.zip);
        set(&mut self.venue_country, &venue.country);
        set(&mut self.venue_timezone, &venue.timezone);
        set(&mut self.venue_coordinates, &venue.coordinates);
    }
}

/// Venue field set used by overrides and the venue resolver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub coordinates: Option<String>,
}

/// Events produced by a single extractor, in document order
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub method: &'static str,
    pub events: Vec<NormalizedEvent>,
}

/// Scope for the processed ledger: one logical crawler per flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub flow_id: String,
    pub job_id: Option<String>,
}

impl FlowContext {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            job_id: None,
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

/// The unit handed to downstream storage for an accepted event
#[derive(Debug, Clone, Serialize)]
pub struct EventPackage {
    pub event: NormalizedEvent,
    pub raw_source: RawEventData,
    pub extraction_method: String,
    pub source_url: String,
    pub import_timestamp: DateTime<Utc>,
    pub event_identifier: String,
    pub flow_id: String,
}

/// A provisional markup fragment found by the section finder; field extraction
/// happens downstream.
#[derive(Debug, Clone, Serialize)]
pub struct SectionPackage {
    pub html: String,
    pub rule: String,
    pub source_url: String,
    pub section_identifier: String,
    pub import_timestamp: DateTime<Utc>,
    pub flow_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_names_and_skips_raw() {
        let mut event = NormalizedEvent::new("Show A");
        event.start_date = Some("2025-06-01".into());
        event.venue_name = Some("The Venue".into());
        event.raw = Some(serde_json::json!({"secret": true}));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["title"], "Show A");
        assert_eq!(json["startDate"], "2025-06-01");
        assert_eq!(json["venueName"], "The Venue");
        assert!(json.get("raw").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn apply_venue_only_overwrites_non_empty_fields() {
        let mut event = NormalizedEvent::new("Show");
        event.venue_name = Some("Scraped Name".into());
        event.venue_city = Some("Seattle".into());

        event.apply_venue(&VenueFields {
            name: Some("Configured Hall".into()),
            city: Some("  ".into()),
            zip: Some("98101".into()),
            ..Default::default()
        });

        assert_eq!(event.venue_name.as_deref(), Some("Configured Hall"));
        assert_eq!(event.venue_city.as_deref(), Some("Seattle"));
        assert_eq!(event.venue_zip.as_deref(), Some("98101"));
    }

    #[test]
    fn searchable_text_joins_title_and_description() {
        let mut event = NormalizedEvent::new("Jazz Night");
        assert_eq!(event.searchable_text(), "Jazz Night");
        event.description = Some("live trio".into());
        assert_eq!(event.searchable_text(), "Jazz Night live trio");
    }
}
