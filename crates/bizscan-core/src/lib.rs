//! Core domain model for bizscan: raw candidate records, canonical listings,
//! and the result set handed to report rendering.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CRATE_NAME: &str = "bizscan-core";

pub const LOCATION_NOT_SPECIFIED: &str = "Location not specified";
pub const OWNERSHIP_UNKNOWN: &str = "unknown";
pub const REASON_NOT_SPECIFIED: &str = "not specified";
pub const NO_MATCHES_REASON: &str = "No businesses found matching the specified criteria";

static MULTIPLE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(\d+\.?\d*)\s*x").expect("valid multiple regex"),
        Regex::new(r"multiple[:\s]*(\d+\.?\d*)").expect("valid multiple regex"),
        Regex::new(r"(\d+\.?\d*)\s*times").expect("valid multiple regex"),
    ]
});

/// How often an owner has to be on site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl VisitFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for VisitFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaborIntensity {
    Low,
    Medium,
    High,
}

impl LaborIntensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for LaborIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-specific, partially populated listing as extracted by an adapter.
///
/// `listing_href` is kept exactly as found on the page; it is resolved
/// against `base_url` during canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub source_id: String,
    pub platform: String,
    pub base_url: String,
    pub name: String,
    pub listing_href: String,
    pub address: Option<String>,
    pub price_text: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub reason_for_sale: Option<String>,
    pub employee_count_text: Option<String>,
    pub financials_text: Option<String>,
    /// Multiple reported as a number by structured sources. Takes precedence
    /// over anything found in the free text.
    pub earnings_multiple: Option<f64>,
    pub ownership_structure: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn new(
        source_id: impl Into<String>,
        platform: impl Into<String>,
        base_url: impl Into<String>,
        name: impl Into<String>,
        listing_href: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            platform: platform.into(),
            base_url: base_url.into(),
            name: name.into(),
            listing_href: listing_href.into(),
            address: None,
            price_text: None,
            description: None,
            industry: None,
            reason_for_sale: None,
            employee_count_text: None,
            financials_text: None,
            earnings_multiple: None,
            ownership_structure: None,
            fetched_at,
        }
    }

    /// Secondary classifier input: the industry when the source exposes one,
    /// otherwise the business name.
    pub fn secondary_text(&self) -> &str {
        self.industry
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// Canonical, fully sentineled business-for-sale record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub address: String,
    pub price: u64,
    pub earnings_multiple: f64,
    pub ownership_structure: String,
    pub visit_frequency: VisitFrequency,
    pub reason_for_sale: String,
    pub ai_disruptability: String,
    pub labor_intensity: LaborIntensity,
    pub platform: String,
    pub listing_url: String,
    pub distance_miles: Option<f64>,
    pub partial_match_explanation: Option<String>,
}

impl Listing {
    pub fn price_disclosed(&self) -> bool {
        self.price > 0
    }
}

/// Serialized output of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub results: Vec<Listing>,
    pub scan_date: DateTime<Utc>,
    pub total_listings_found: usize,
    pub unique_listings: usize,
    pub no_matches_reason: String,
}

impl ResultSet {
    pub fn new(results: Vec<Listing>, scan_date: DateTime<Utc>, total_listings_found: usize) -> Self {
        let no_matches_reason = if results.is_empty() {
            NO_MATCHES_REASON.to_string()
        } else {
            String::new()
        };
        Self {
            unique_listings: results.len(),
            results,
            scan_date,
            total_listings_found,
            no_matches_reason,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Parse an asking price from free text. Anything unparseable is `0`
/// ("not disclosed").
pub fn extract_price(price_text: &str) -> u64 {
    let cleaned = price_text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>();
    if cleaned.is_empty() {
        return 0;
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value.trunc() as u64,
        _ => 0,
    }
}

/// First run of ASCII digits in `text`, or `0`.
pub fn extract_first_integer(text: &str) -> u64 {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .and_then(|run| run.parse().ok())
        .unwrap_or(0)
}

/// Earnings multiple written as `4.2x`, `multiple: 4.2` or `4.2 times`.
pub fn extract_earnings_multiple(text: &str) -> f64 {
    let lower = text.to_lowercase();
    for pattern in MULTIPLE_PATTERNS.iter() {
        if let Some(value) = pattern
            .captures(&lower)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
        {
            return value;
        }
    }
    0.0
}

/// Resolve a listing link found on a source page against the source's base URL.
pub fn resolve_listing_url(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Trimmed text, or `None` when nothing is left.
pub fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|s| !s.is_empty())
}
