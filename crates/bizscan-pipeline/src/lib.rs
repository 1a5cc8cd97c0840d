//! Listing normalization and deduplication pipeline.
//!
//! Source adapters feed candidate records in configured order; each record
//! is canonicalized (classifier plus distance lookup), filtered against the
//! acquisition criteria, then the combined set is deduplicated and sorted
//! by price.

mod aggregate;
mod canonical;
mod classify;
mod config;
mod dedup;
mod filter;
mod geo;
mod output;

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bizscan_adapters::AdapterContext;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};

pub use aggregate::{ConfiguredSource, RunStats, ScanPipeline, ScanReport, SourceRunStats};
pub use canonical::{partial_match_explanation, CanonicalizeError, Canonicalizer};
pub use classify::{
    AutomationRiskRules, Classification, ClassifierRules, HeuristicClassifier, LaborRules,
    VisitRule, AI_RISK_HIGH, AI_RISK_LOW, AI_RISK_MEDIUM,
};
pub use config::{ScanConfig, SourceConfig, SourceMode, SourceRegistry, DEFAULT_MAX_PAGES};
pub use dedup::{dedup_key, DedupConfig, DedupOutcome, Deduplicator, NearDuplicate};
pub use filter::{QualificationCriteria, Rejection};
pub use geo::{
    haversine_miles, DistanceLookup, GeoPoint, NoDistance, NominatimDistance, NOMINATIM_URL,
    REFERENCE_ADDRESS, REFERENCE_FALLBACK,
};
pub use output::{
    dashboard_file_name, results_file_name, write_outputs, ManifestEntry, OutputManifest,
    WrittenOutputs, MANIFEST_FILE,
};

pub const CRATE_NAME: &str = "bizscan-pipeline";

pub type ScheduledJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// One scan with a fresh run context.
pub async fn run_scan_once(config: &ScanConfig) -> Result<ScanReport> {
    let pipeline = ScanPipeline::from_config(config).await?;
    let ctx = AdapterContext::new(Utc::now());
    Ok(pipeline.run(&ctx).await)
}

/// Scheduler firing `job` on a six-field cron expression. Not started.
pub async fn build_scheduler<F>(cron: &str, job: F) -> Result<JobScheduler>
where
    F: Fn() -> ScheduledJob + Send + Sync + 'static,
{
    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let job = Job::new_async(cron, move |_uuid, _lock| job())
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(sched)
}
