//! Aggregator: runs every configured source in order, canonicalizes and
//! filters its candidates, then deduplicates, sorts and packages the run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bizscan_adapters::{adapter_for_source, AdapterContext, SourceAdapter};
use bizscan_core::{CandidateRecord, Listing, ResultSet};
use bizscan_storage::HttpFetcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::canonical::Canonicalizer;
use crate::classify::HeuristicClassifier;
use crate::config::{ScanConfig, SourceMode, SourceRegistry};
use crate::dedup::{DedupConfig, Deduplicator, NearDuplicate};
use crate::filter::QualificationCriteria;
use crate::geo::{DistanceLookup, NoDistance, NominatimDistance};

/// One adapter plus how to drive it this run.
pub struct ConfiguredSource {
    pub adapter: Box<dyn SourceAdapter>,
    pub max_pages: usize,
    pub mode: SourceMode,
    pub fixture_pages: Vec<PathBuf>,
}

impl ConfiguredSource {
    pub fn live(adapter: Box<dyn SourceAdapter>, max_pages: usize) -> Self {
        Self {
            adapter,
            max_pages,
            mode: SourceMode::Live,
            fixture_pages: Vec::new(),
        }
    }

    pub fn fixture(adapter: Box<dyn SourceAdapter>, pages: Vec<PathBuf>) -> Self {
        Self {
            adapter,
            max_pages: pages.len(),
            mode: SourceMode::Fixture,
            fixture_pages: pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRunStats {
    pub source_id: String,
    pub candidates: usize,
    pub qualified: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceRunStats>,
    pub candidates_seen: usize,
    pub qualified: usize,
    pub duplicates_dropped: usize,
    pub near_duplicates: Vec<NearDuplicate>,
}

impl RunStats {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceRunStats> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub result_set: ResultSet,
    pub stats: RunStats,
}

pub struct ScanPipeline {
    sources: Vec<ConfiguredSource>,
    http: Arc<HttpFetcher>,
    canonicalizer: Canonicalizer,
    criteria: QualificationCriteria,
    deduplicator: Deduplicator,
}

impl ScanPipeline {
    pub fn new(http: Arc<HttpFetcher>, canonicalizer: Canonicalizer) -> Self {
        Self {
            sources: Vec::new(),
            http,
            canonicalizer,
            criteria: QualificationCriteria::default(),
            deduplicator: Deduplicator::default(),
        }
    }

    pub fn with_source(mut self, source: ConfiguredSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_criteria(mut self, criteria: QualificationCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_dedup(mut self, config: DedupConfig) -> Self {
        self.deduplicator = Deduplicator::new(config);
        self
    }

    /// Wire a pipeline from env config, `sources.yaml` and `rules/classifier.yaml`.
    pub async fn from_config(config: &ScanConfig) -> Result<Self> {
        let registry = SourceRegistry::load(&config.workspace_root).await?;
        let classifier = HeuristicClassifier::from_workspace_root(&config.workspace_root).await?;
        let http = Arc::new(
            HttpFetcher::new(config.fetcher_config()).context("building http fetcher")?,
        );
        let distance: Arc<dyn DistanceLookup> = if config.geocode {
            Arc::new(NominatimDistance::new(http.clone()))
        } else {
            Arc::new(NoDistance)
        };

        let settings = config.adapter_settings();
        let mut pipeline = Self::new(http, Canonicalizer::new(classifier, distance))
            .with_criteria(registry.criteria.clone())
            .with_dedup(registry.dedup);

        for source in registry.enabled_sources() {
            let Some(adapter) = adapter_for_source(&source.source_id, &settings) else {
                warn!(source_id = %source.source_id, "no adapter registered, source skipped");
                continue;
            };
            let configured = match source.mode {
                SourceMode::Live => ConfiguredSource::live(adapter, source.max_pages),
                SourceMode::Fixture => {
                    let pages = source
                        .fixture_pages
                        .iter()
                        .map(|p| config.workspace_root.join(p))
                        .take(source.max_pages)
                        .collect();
                    ConfiguredSource::fixture(adapter, pages)
                }
            };
            pipeline = pipeline.with_source(configured);
        }
        Ok(pipeline)
    }

    /// Run every source once. Never fails: per-record and per-source
    /// problems are logged and recorded in the run stats.
    pub async fn run(&self, ctx: &AdapterContext) -> ScanReport {
        let span = info_span!("scan", run_id = %ctx.run_id);
        self.run_inner(ctx).instrument(span).await
    }

    async fn run_inner(&self, ctx: &AdapterContext) -> ScanReport {
        let started_at = Utc::now();
        info!(sources = self.sources.len(), "starting business acquisition scan");

        let mut combined: Vec<Listing> = Vec::new();
        let mut source_stats = Vec::with_capacity(self.sources.len());
        let mut candidates_seen = 0usize;

        for source in &self.sources {
            let source_id = source.adapter.source_id();
            let mut stats = SourceRunStats {
                source_id: source_id.to_string(),
                candidates: 0,
                qualified: 0,
                error: None,
            };

            let candidates = match self.collect_candidates(ctx, source).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    error!(source_id, error = %format!("{err:#}"), "source failed, continuing");
                    stats.error = Some(format!("{err:#}"));
                    source_stats.push(stats);
                    continue;
                }
            };
            stats.candidates = candidates.len();
            candidates_seen += candidates.len();

            for record in &candidates {
                let listing = match self.canonicalizer.canonicalize(ctx, record).await {
                    Ok(listing) => listing,
                    Err(err) => {
                        warn!(source_id, error = %err, "skipping candidate");
                        continue;
                    }
                };
                match self.criteria.rejection(&listing) {
                    None => {
                        stats.qualified += 1;
                        combined.push(listing);
                    }
                    Some(reason) => {
                        debug!(source_id, name = %listing.name, reason = reason.as_str(), "filtered out");
                    }
                }
            }

            info!(
                source_id,
                candidates = stats.candidates,
                qualified = stats.qualified,
                "source finished"
            );
            source_stats.push(stats);
        }

        let qualified = combined.len();
        let outcome = self.deduplicator.apply(combined);
        let mut results = outcome.kept;
        results.sort_by_key(|listing| listing.price);

        let finished_at = Utc::now();
        let result_set = ResultSet::new(results, finished_at, qualified);
        info!(
            candidates_seen,
            qualified,
            unique = result_set.unique_listings,
            duplicates = outcome.dropped,
            "scan finished"
        );

        ScanReport {
            result_set,
            stats: RunStats {
                run_id: ctx.run_id,
                started_at,
                finished_at,
                sources: source_stats,
                candidates_seen,
                qualified,
                duplicates_dropped: outcome.dropped,
                near_duplicates: outcome.near_duplicates,
            },
        }
    }

    async fn collect_candidates(
        &self,
        ctx: &AdapterContext,
        source: &ConfiguredSource,
    ) -> Result<Vec<CandidateRecord>> {
        let adapter = source.adapter.as_ref();
        match source.mode {
            SourceMode::Live => Ok(adapter
                .scrape_listings(&self.http, ctx, source.max_pages)
                .await?),
            SourceMode::Fixture => {
                let page_url = adapter.first_page_url();
                let mut records = Vec::new();
                for path in source.fixture_pages.iter().take(source.max_pages) {
                    let body = tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("reading fixture page {}", path.display()))?;
                    let page = adapter
                        .parse_page(ctx, &page_url, &body)
                        .with_context(|| format!("parsing fixture page {}", path.display()))?;
                    records.extend(page.records);
                }
                Ok(records)
            }
        }
    }
}
