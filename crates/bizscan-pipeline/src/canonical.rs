//! Canonicalizer: one Candidate Record in, one fully sentineled Listing out.

use std::sync::Arc;

use bizscan_adapters::AdapterContext;
use bizscan_core::{
    extract_earnings_multiple, extract_price, non_empty, resolve_listing_url, CandidateRecord,
    Listing, VisitFrequency, LOCATION_NOT_SPECIFIED, OWNERSHIP_UNKNOWN, REASON_NOT_SPECIFIED,
};
use thiserror::Error;

use crate::classify::HeuristicClassifier;
use crate::geo::DistanceLookup;

#[derive(Debug, Error)]
pub enum CanonicalizeError {
    #[error("candidate from {source_id} has no name")]
    EmptyName { source_id: String },
}

pub struct Canonicalizer {
    classifier: HeuristicClassifier,
    distance: Arc<dyn DistanceLookup>,
}

impl Canonicalizer {
    pub fn new(classifier: HeuristicClassifier, distance: Arc<dyn DistanceLookup>) -> Self {
        Self {
            classifier,
            distance,
        }
    }

    pub async fn canonicalize(
        &self,
        ctx: &AdapterContext,
        record: &CandidateRecord,
    ) -> Result<Listing, CanonicalizeError> {
        let name = non_empty(Some(record.name.as_str()))
            .ok_or_else(|| CanonicalizeError::EmptyName {
                source_id: record.source_id.clone(),
            })?
            .to_string();

        let address = non_empty(record.address.as_deref())
            .unwrap_or(LOCATION_NOT_SPECIFIED)
            .to_string();
        let price = extract_price(record.price_text.as_deref().unwrap_or_default());
        let earnings_multiple = record
            .earnings_multiple
            .filter(|m| m.is_finite() && *m >= 0.0)
            .unwrap_or_else(|| text_multiple(record));
        let labels = self.classifier.classify(record);

        let distance_miles = if address == LOCATION_NOT_SPECIFIED {
            None
        } else {
            self.distance.distance_miles(ctx, &address).await
        };

        let mut listing = Listing {
            name,
            address,
            price,
            earnings_multiple,
            ownership_structure: non_empty(record.ownership_structure.as_deref())
                .unwrap_or(OWNERSHIP_UNKNOWN)
                .to_string(),
            visit_frequency: labels.visit_frequency,
            reason_for_sale: non_empty(record.reason_for_sale.as_deref())
                .unwrap_or(REASON_NOT_SPECIFIED)
                .to_string(),
            ai_disruptability: labels.ai_disruptability.to_string(),
            labor_intensity: labels.labor_intensity,
            platform: record.platform.clone(),
            listing_url: resolve_listing_url(&record.base_url, &record.listing_href),
            distance_miles,
            partial_match_explanation: None,
        };
        listing.partial_match_explanation = partial_match_explanation(&listing);
        Ok(listing)
    }
}

/// Multiple from the financials snippet, or from the description when the
/// snippet has none.
fn text_multiple(record: &CandidateRecord) -> f64 {
    [&record.financials_text, &record.description]
        .into_iter()
        .filter_map(|text| text.as_deref())
        .map(extract_earnings_multiple)
        .find(|m| *m > 0.0)
        .unwrap_or(0.0)
}

/// Soft-preference deviations worth flagging on an otherwise qualifying
/// listing, joined with `"; "`.
pub fn partial_match_explanation(listing: &Listing) -> Option<String> {
    let mut notes = Vec::new();
    if listing.visit_frequency != VisitFrequency::Monthly {
        notes.push(format!(
            "Visit frequency is {} rather than monthly",
            listing.visit_frequency
        ));
    }
    if !listing.price_disclosed() {
        notes.push("Asking price not disclosed".to_string());
    }
    if listing.earnings_multiple == 0.0 {
        notes.push("Earnings multiple unknown".to_string());
    }
    if listing.distance_miles.is_none() {
        notes.push("Distance from reference location unknown".to_string());
    }

    if notes.is_empty() {
        None
    } else {
        Some(notes.join("; "))
    }
}
