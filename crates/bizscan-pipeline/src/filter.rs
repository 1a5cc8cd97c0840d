//! Qualification Filter: the acquisition criteria a listing must meet.

use bizscan_core::Listing;
use serde::{Deserialize, Serialize};

/// Thresholds for the four inclusion predicates. All must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationCriteria {
    pub max_price: u64,
    pub max_distance_miles: f64,
    pub max_earnings_multiple: f64,
    pub reason_keywords: Vec<String>,
}

impl Default for QualificationCriteria {
    fn default() -> Self {
        Self {
            max_price: 5_000_000,
            max_distance_miles: 50.0,
            max_earnings_multiple: 5.0,
            reason_keywords: ["retirement", "retiring", "succession", "aging", "health"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Which predicate rejected a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    PriceAboveCeiling,
    TooFar,
    MultipleTooHigh,
    ReasonNotQualifying,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceAboveCeiling => "price above ceiling",
            Self::TooFar => "too far from reference location",
            Self::MultipleTooHigh => "earnings multiple too high",
            Self::ReasonNotQualifying => "reason for sale does not qualify",
        }
    }
}

impl QualificationCriteria {
    pub fn qualifies(&self, listing: &Listing) -> bool {
        self.rejection(listing).is_none()
    }

    /// First failing predicate, in predicate order.
    pub fn rejection(&self, listing: &Listing) -> Option<Rejection> {
        // An undisclosed price (0) always passes.
        if listing.price > self.max_price {
            return Some(Rejection::PriceAboveCeiling);
        }
        if listing
            .distance_miles
            .is_some_and(|miles| miles > self.max_distance_miles)
        {
            return Some(Rejection::TooFar);
        }
        if listing.earnings_multiple != 0.0 && listing.earnings_multiple > self.max_earnings_multiple {
            return Some(Rejection::MultipleTooHigh);
        }
        let reason = listing.reason_for_sale.to_lowercase();
        if !self
            .reason_keywords
            .iter()
            .any(|keyword| reason.contains(&keyword.to_lowercase()))
        {
            return Some(Rejection::ReasonNotQualifying);
        }
        None
    }

    /// Keep only qualifying listings, preserving order.
    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        listings.into_iter().filter(|l| self.qualifies(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizscan_core::{LaborIntensity, VisitFrequency};

    fn listing() -> Listing {
        Listing {
            name: "Precision Machining Shop".into(),
            address: "Long Island City, NY".into(),
            price: 2_750_000,
            earnings_multiple: 4.1,
            ownership_structure: "unknown".into(),
            visit_frequency: VisitFrequency::Monthly,
            reason_for_sale: "Owner is retiring".into(),
            ai_disruptability: "Low risk".into(),
            labor_intensity: LaborIntensity::Medium,
            platform: "BizQuest".into(),
            listing_url: "https://www.bizquest.com/listing/1".into(),
            distance_miles: Some(4.0),
            partial_match_explanation: None,
        }
    }

    #[test]
    fn price_ceiling_is_inclusive() {
        let criteria = QualificationCriteria::default();
        let mut l = listing();
        l.price = 5_000_000;
        assert!(criteria.qualifies(&l));
        l.price = 5_000_001;
        assert_eq!(criteria.rejection(&l), Some(Rejection::PriceAboveCeiling));
        l.price = 0;
        assert!(criteria.qualifies(&l));
    }

    #[test]
    fn distance_limit_is_inclusive_and_unknown_passes() {
        let criteria = QualificationCriteria::default();
        let mut l = listing();
        l.distance_miles = Some(50.0);
        assert!(criteria.qualifies(&l));
        l.distance_miles = Some(50.1);
        assert_eq!(criteria.rejection(&l), Some(Rejection::TooFar));
        l.distance_miles = None;
        assert!(criteria.qualifies(&l));
    }

    #[test]
    fn multiple_limit_is_inclusive_and_zero_means_unknown() {
        let criteria = QualificationCriteria::default();
        let mut l = listing();
        l.earnings_multiple = 5.0;
        assert!(criteria.qualifies(&l));
        l.earnings_multiple = 5.01;
        assert_eq!(criteria.rejection(&l), Some(Rejection::MultipleTooHigh));
        l.earnings_multiple = 0.0;
        assert!(criteria.qualifies(&l));
    }

    #[test]
    fn reason_for_sale_gate() {
        let criteria = QualificationCriteria::default();
        let mut l = listing();
        l.reason_for_sale = "Owner is retiring".into();
        assert!(criteria.qualifies(&l));
        l.reason_for_sale = "SUCCESSION planning".into();
        assert!(criteria.qualifies(&l));
        l.reason_for_sale = "business is thriving, owner wants to expand".into();
        assert_eq!(criteria.rejection(&l), Some(Rejection::ReasonNotQualifying));
        l.reason_for_sale = "not specified".into();
        assert!(!criteria.qualifies(&l));
    }

    #[test]
    fn filtering_is_idempotent() {
        let criteria = QualificationCriteria::default();
        let mut far = listing();
        far.distance_miles = Some(80.0);
        let mut pricey = listing();
        pricey.price = 9_000_000;
        let input = vec![listing(), far, pricey, listing()];

        let once = criteria.apply(input);
        let twice = criteria.apply(once.clone());
        assert_eq!(once.len(), 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn criteria_section_fills_missing_fields_from_defaults() {
        let criteria: QualificationCriteria = serde_yaml::from_str("max_price: 2000000\n").unwrap();
        assert_eq!(criteria.max_price, 2_000_000);
        assert_eq!(criteria.max_distance_miles, 50.0);
        assert_eq!(criteria.reason_keywords.len(), 5);
    }
}
