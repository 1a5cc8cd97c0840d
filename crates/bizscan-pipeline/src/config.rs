use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bizscan_adapters::{default_source_order, AdapterSettings};
use bizscan_storage::{BackoffPolicy, FetcherConfig, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dedup::DedupConfig;
use crate::filter::QualificationCriteria;

pub const DEFAULT_MAX_PAGES: usize = 3;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub workspace_root: PathBuf,
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub request_interval_ms: u64,
    pub geocode: bool,
    pub schedule_cron: String,
    pub zyla_api_key: Option<String>,
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True" | "yes"))
        .unwrap_or(default)
}

impl ScanConfig {
    pub fn from_env() -> Self {
        Self {
            workspace_root: std::env::var("BIZSCAN_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            output_dir: std::env::var("BIZSCAN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
            user_agent: std::env::var("BIZSCAN_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            http_timeout_secs: std::env::var("BIZSCAN_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            request_interval_ms: std::env::var("BIZSCAN_REQUEST_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            geocode: env_flag("BIZSCAN_GEOCODE", true),
            schedule_cron: std::env::var("BIZSCAN_SCHEDULE_CRON")
                .unwrap_or_else(|_| "0 0 9 * * *".to_string()),
            zyla_api_key: std::env::var("ZYLA_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: self.user_agent.clone(),
            request_interval: Duration::from_millis(self.request_interval_ms),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            zyla_api_key: self.zyla_api_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Live,
    /// Parse saved pages from disk instead of fetching.
    Fixture,
}

fn default_enabled() -> bool {
    true
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: SourceMode,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Workspace-relative pages read in fixture mode, in order.
    #[serde(default)]
    pub fixture_pages: Vec<PathBuf>,
}

impl SourceConfig {
    pub fn live(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            enabled: true,
            mode: SourceMode::Live,
            max_pages: DEFAULT_MAX_PAGES,
            fixture_pages: Vec::new(),
        }
    }
}

/// `sources.yaml`: list order is the configured order used for dedup
/// survivor choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub criteria: QualificationCriteria,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self {
            sources: default_source_order()
                .into_iter()
                .map(SourceConfig::live)
                .collect(),
            criteria: QualificationCriteria::default(),
            dedup: DedupConfig::default(),
        }
    }
}

impl SourceRegistry {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing source registry")
    }

    /// `sources.yaml` under `root`, or the built-in registry when absent.
    pub async fn load(root: &Path) -> Result<Self> {
        let path = root.join("sources.yaml");
        if !tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("checking {}", path.display()))?
        {
            info!(path = %path.display(), "no source registry, using built-in sources");
            return Ok(Self::default());
        }
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}
