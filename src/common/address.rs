//! Best-effort splitting of single-line postal addresses such as
//! "5140 Ballard Ave NW, Seattle, WA 98107, USA".

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

static STATE_ZIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2}|[A-Za-z][A-Za-z .]+?)\s+(\d{5}(?:-\d{4})?|[A-Z]\d[A-Z]\s?\d[A-Z]\d)$")
        .expect("valid state/zip regex")
});

static CITY_STATE_ZIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s+([A-Z]{2})\s+(\d{5}(?:-\d{4})?)$").expect("valid city/state/zip regex")
});

static ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("valid zip regex"));

const COUNTRY_NAMES: &[&str] = &[
    "usa",
    "us",
    "united states",
    "united states of america",
    "canada",
    "ca",
    "uk",
    "united kingdom",
    "gb",
    "australia",
    "mexico",
];

fn is_country(part: &str) -> bool {
    COUNTRY_NAMES.contains(&part.to_lowercase().as_str())
}

/// Split a comma-separated address. Unrecognized layouts keep the whole string as
/// the street so nothing is lost.
pub fn split_address(input: &str) -> AddressParts {
    let mut parts: Vec<String> = input
        .split(|c| c == ',' || c == '\n')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = AddressParts::default();
    if parts.is_empty() {
        return out;
    }

    if parts.len() > 1 && is_country(parts[parts.len() - 1].as_str()) {
        out.country = parts.pop();
    }

    // "WA 98107" or "WA" + "98107"
    if let Some(last) = parts.last() {
        if let Some(caps) = CITY_STATE_ZIP_RE.captures(last).filter(|_| parts.len() > 1) {
            out.city = Some(caps[1].trim().to_string());
            out.state = Some(caps[2].to_string());
            out.zip = Some(caps[3].to_string());
            parts.pop();
        } else if let Some(caps) = STATE_ZIP_RE.captures(last) {
            out.state = Some(caps[1].trim().to_string());
            out.zip = Some(caps[2].to_string());
            parts.pop();
        } else if ZIP_RE.is_match(last) && parts.len() > 1 {
            out.zip = parts.pop();
            if parts.len() > 1 {
                out.state = parts.pop();
            }
        } else if parts.len() >= 3 && last.len() == 2 && last.chars().all(|c| c.is_ascii_alphabetic()) {
            out.state = parts.pop();
        }
    }

    if out.city.is_none() && parts.len() >= 2 {
        out.city = parts.pop();
    }

    if !parts.is_empty() {
        out.street = Some(parts.join(", "));
    }
    out
}
