//! Date, time and timezone helpers shared by the extractors, the section finder
//! and the past-event filter.
//!
//! Everything here resolves to a calendar date plus an optional local wall-clock
//! time. A zone is only ever applied when the caller passes one in; the server's
//! local zone is never consulted.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// A calendar date with an optional local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeParts {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl DateTimeParts {
    pub fn date_only(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn from_naive(dt: NaiveDateTime) -> Self {
        Self {
            date: dt.date(),
            time: Some(dt.time()),
        }
    }

    pub fn date_string(&self) -> String {
        format_date(self.date)
    }

    pub fn time_string(&self) -> Option<String> {
        self.time.map(format_time)
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse an IANA zone name; offsets and abbreviations such as "PST" are rejected.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    name.parse::<Tz>().ok()
}

/// "Today" in the given zone, UTC when no zone is configured
pub fn today_in(zone: Option<Tz>) -> NaiveDate {
    match zone {
        Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Where "today" comes from. The clock is read on every call unless a fixed date
/// is pinned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceDate {
    zone: Option<Tz>,
    fixed: Option<NaiveDate>,
}

impl ReferenceDate {
    pub fn in_zone(zone: Option<Tz>) -> Self {
        Self { zone, fixed: None }
    }

    pub fn fixed(date: NaiveDate) -> Self {
        Self {
            zone: None,
            fixed: Some(date),
        }
    }

    pub fn with_fixed(mut self, date: NaiveDate) -> Self {
        self.fixed = Some(date);
        self
    }

    pub fn zone(&self) -> Option<Tz> {
        self.zone
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed.unwrap_or_else(|| today_in(self.zone))
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y%m%dT%H%M%S%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a machine-formatted date or datetime.
///
/// Values carrying an offset are converted into `zone` when one is known; without a
/// zone the wall-clock time is kept exactly as written. Naive values are never
/// shifted.
pub fn parse_datetime(value: &str, zone: Option<Tz>) -> Option<DateTimeParts> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // 20250601T200000Z style (ICS UTC) is not RFC 3339
    if let Some(stripped) = value.strip_suffix('Z').filter(|v| !v.contains('-')) {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S") {
            return Some(localize_utc(naive, zone));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(match zone {
            Some(tz) => DateTimeParts::from_naive(dt.with_timezone(&tz).naive_local()),
            None => DateTimeParts::from_naive(dt.naive_local()),
        });
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(match zone {
                Some(tz) => DateTimeParts::from_naive(dt.with_timezone(&tz).naive_local()),
                None => DateTimeParts::from_naive(dt.naive_local()),
            });
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(DateTimeParts::from_naive(naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(DateTimeParts::date_only(date));
        }
    }

    None
}

/// Interpret a naive UTC timestamp in `zone`, or keep it as UTC wall-clock
pub fn localize_utc(naive: NaiveDateTime, zone: Option<Tz>) -> DateTimeParts {
    match zone {
        Some(tz) => DateTimeParts::from_naive(Utc.from_utc_datetime(&naive).with_timezone(&tz).naive_local()),
        None => DateTimeParts::from_naive(naive),
    }
}

/// Epoch milliseconds (Squarespace, several widget payloads)
pub fn from_epoch_millis(millis: i64, zone: Option<Tz>) -> Option<DateTimeParts> {
    let dt = DateTime::<Utc>::from_timestamp_millis(millis)?;
    Some(localize_utc(dt.naive_utc(), zone))
}

static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4}))?",
    )
    .expect("valid month-day regex")
});

static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?(?:,?\s+(\d{4}))?",
    )
    .expect("valid day-month regex")
});

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid iso date regex"));

static SLASH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").expect("valid slash date regex")
});

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.get(..3)?.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn expand_year(year: i32) -> i32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

/// Build a date for a month/day pair without a year. Listings only show upcoming
/// dates, so anything more than two months behind the reference rolls into next year.
fn infer_year(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if candidate < reference - Duration::days(60) {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

fn assemble(month: u32, day: u32, year: Option<i32>, reference: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(y) => NaiveDate::from_ymd_opt(expand_year(y), month, day),
        None => infer_year(month, day, reference),
    }
}

/// Find the first human-written date in free text ("Sat, June 7", "7 June 2025",
/// "6/7/25", "2025-06-07"). Missing years are inferred relative to `reference`.
pub fn parse_date_text(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE_RE.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month = month_from_name(&caps[1]);
        let day: Option<u32> = caps[2].parse().ok();
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        if let (Some(month), Some(day)) = (month, day) {
            if let Some(date) = assemble(month, day, year, reference) {
                return Some(date);
            }
        }
    }

    if let Some(caps) = DAY_MONTH_RE.captures(text) {
        let day: Option<u32> = caps[1].parse().ok();
        let month = month_from_name(&caps[2]);
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        if let (Some(month), Some(day)) = (month, day) {
            if let Some(date) = assemble(month, day, year, reference) {
                return Some(date);
            }
        }
    }

    if let Some(caps) = SLASH_DATE_RE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        return assemble(month, day, year, reference);
    }

    None
}

static AMPM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:[:.](\d{2}))?\s*(a\.?\s?m\.?|p\.?\s?m\.?)").expect("valid am/pm regex")
});

static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid 24h regex"));

/// Parse the first time mentioned in text: "8pm", "7:30 PM", "1 p.m.", "noon", "20:00"
pub fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if let Some(caps) = AMPM_RE.captures(&lower) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let is_pm = caps[3].starts_with('p');
        if hour == 0 || hour > 12 {
            return None;
        }
        let hour_24 = match (is_pm, hour) {
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, 12) => 0,
            (false, h) => h,
        };
        return NaiveTime::from_hms_opt(hour_24, minute, 0);
    }

    if lower.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if lower.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    let caps = CLOCK_RE.captures(&lower)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// True when `date` (a `YYYY-MM-DD` or any machine date) is strictly before `today`.
/// Missing or unparseable dates are never past.
pub fn is_past(date: Option<&str>, today: NaiveDate) -> bool {
    date.and_then(|d| parse_datetime(d, None))
        .map(|parts| parts.date < today)
        .unwrap_or(false)
}
