//! Cross-source duplicate collapse on an exact `name|address` key.
//!
//! Survivor choice is positional: the first listing to produce a key wins,
//! so callers must feed listings in configured source order. Similar but
//! non-identical keys from different platforms are reported for review and
//! never dropped.

use std::collections::HashSet;

use bizscan_core::Listing;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Jaro-Winkler score at or above which two surviving keys are reported.
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearDuplicate {
    pub key_a: String,
    pub platform_a: String,
    pub key_b: String,
    pub platform_b: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub kept: Vec<Listing>,
    pub dropped: usize,
    pub near_duplicates: Vec<NearDuplicate>,
}

/// Lower-case, keep word characters and whitespace, trim.
fn normalize_fragment(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn dedup_key(listing: &Listing) -> String {
    format!(
        "{}|{}",
        normalize_fragment(&listing.name),
        normalize_fragment(&listing.address)
    )
}

#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, listings: Vec<Listing>) -> DedupOutcome {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(listings.len());
        let mut kept_keys = Vec::with_capacity(listings.len());
        let mut dropped = 0usize;

        for listing in listings {
            let key = dedup_key(&listing);
            if seen.insert(key.clone()) {
                kept_keys.push(key);
                kept.push(listing);
            } else {
                dropped += 1;
                info!(name = %listing.name, address = %listing.address, platform = %listing.platform, "duplicate dropped");
            }
        }

        let near_duplicates = self.near_duplicates(&kept, &kept_keys);
        DedupOutcome {
            kept,
            dropped,
            near_duplicates,
        }
    }

    fn near_duplicates(&self, kept: &[Listing], keys: &[String]) -> Vec<NearDuplicate> {
        let mut pairs = Vec::new();
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                if kept[i].platform == kept[j].platform {
                    continue;
                }
                let score = jaro_winkler(&keys[i], &keys[j]);
                if score >= self.config.similarity_threshold {
                    debug!(key_a = %keys[i], key_b = %keys[j], score, "possible near duplicate");
                    pairs.push(NearDuplicate {
                        key_a: keys[i].clone(),
                        platform_a: kept[i].platform.clone(),
                        key_b: keys[j].clone(),
                        platform_b: kept[j].platform.clone(),
                        similarity: score,
                    });
                }
            }
        }
        pairs
    }
}
