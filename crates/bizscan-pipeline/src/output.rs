//! Dated result files plus a manifest, written through the atomic store.

use anyhow::{Context, Result};
use bizscan_core::ResultSet;
use bizscan_storage::{OutputStore, StoredFile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";

pub fn results_file_name(scan_date: DateTime<Utc>) -> String {
    format!("business_listings_{}.json", scan_date.format("%Y%m%d"))
}

pub fn dashboard_file_name(scan_date: DateTime<Utc>) -> String {
    format!("business_listings_{}_dashboard.html", scan_date.format("%Y%m%d"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

fn manifest_entry(name: &str, stored: &StoredFile) -> ManifestEntry {
    ManifestEntry {
        name: name.to_string(),
        path: stored.relative_path.display().to_string(),
        sha256: stored.content_hash.clone(),
        bytes: stored.byte_size as u64,
    }
}

#[derive(Debug, Clone)]
pub struct WrittenOutputs {
    pub results: StoredFile,
    pub dashboard: Option<StoredFile>,
    pub manifest: StoredFile,
}

/// Write the result set (and dashboard, when rendered) for its scan date.
pub async fn write_outputs(
    store: &OutputStore,
    result_set: &ResultSet,
    dashboard_html: Option<&str>,
) -> Result<WrittenOutputs> {
    let json = serde_json::to_vec_pretty(result_set).context("serializing result set")?;
    let results = store
        .write_atomic(results_file_name(result_set.scan_date), &json)
        .await?;
    let mut entries = vec![manifest_entry("results", &results)];

    let dashboard = match dashboard_html {
        Some(html) => {
            let stored = store
                .write_atomic(dashboard_file_name(result_set.scan_date), html.as_bytes())
                .await?;
            entries.push(manifest_entry("dashboard", &stored));
            Some(stored)
        }
        None => None,
    };

    let manifest_bytes = serde_json::to_vec_pretty(&OutputManifest { files: entries })
        .context("serializing output manifest")?;
    let manifest = store.write_atomic(MANIFEST_FILE, &manifest_bytes).await?;

    info!(
        results = %results.absolute_path.display(),
        unchanged = results.unchanged,
        "scan outputs written"
    );
    Ok(WrittenOutputs {
        results,
        dashboard,
        manifest,
    })
}
