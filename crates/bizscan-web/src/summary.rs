use std::collections::BTreeMap;

use bizscan_core::{LaborIntensity, ResultSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCount {
    pub platform: String,
    pub count: usize,
}

/// Derived figures shown above the listing cards. Price statistics only
/// consider listings with a disclosed (nonzero) price and are 0 when none do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_results: usize,
    pub avg_price: f64,
    pub min_price: u64,
    pub max_price: u64,
    pub labor_counts: LaborCounts,
    /// Sorted by platform name.
    pub platform_counts: Vec<PlatformCount>,
    pub duplicates_removed: usize,
}

impl ReportSummary {
    pub fn from_result_set(set: &ResultSet) -> Self {
        let prices = set
            .results
            .iter()
            .map(|l| l.price)
            .filter(|p| *p > 0)
            .collect::<Vec<_>>();
        let avg_price = if prices.is_empty() {
            0.0
        } else {
            prices.iter().sum::<u64>() as f64 / prices.len() as f64
        };

        let mut labor_counts = LaborCounts::default();
        let mut platforms = BTreeMap::<String, usize>::new();
        for listing in &set.results {
            match listing.labor_intensity {
                LaborIntensity::Low => labor_counts.low += 1,
                LaborIntensity::Medium => labor_counts.medium += 1,
                LaborIntensity::High => labor_counts.high += 1,
            }
            *platforms.entry(listing.platform.clone()).or_default() += 1;
        }

        Self {
            total_results: set.results.len(),
            avg_price,
            min_price: prices.iter().copied().min().unwrap_or(0),
            max_price: prices.iter().copied().max().unwrap_or(0),
            labor_counts,
            platform_counts: platforms
                .into_iter()
                .map(|(platform, count)| PlatformCount { platform, count })
                .collect(),
            duplicates_removed: set.total_listings_found.saturating_sub(set.unique_listings),
        }
    }
}
