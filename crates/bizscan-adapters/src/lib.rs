//! Source adapter contract plus the marketplace adapters.
//!
//! Every adapter turns pages from one marketplace into [`CandidateRecord`]s.
//! Adapters only locate fields; price parsing, classification and URL
//! resolution happen downstream so all sources are treated identically.

mod html;
mod zyla;

use async_trait::async_trait;
use bizscan_core::CandidateRecord;
use bizscan_storage::{FetchError, HttpFetcher};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub use html::{
    DetailProfile, HtmlListingAdapter, SiteProfile, BIZBUYSELL, BIZQUEST, BUSINESSBROKER_NET,
    DEALSTREAM, LOOPNET,
};
pub use zyla::{ZylaApiAdapter, ZYLA_SOURCE_ID};

pub const CRATE_NAME: &str = "bizscan-adapters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    PublicHtml,
    Api,
}

/// Run-scoped state handed to adapters instead of process-wide globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

impl AdapterContext {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched_at,
        }
    }
}

/// One parsed page: the records that could be extracted and where to go next.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub records: Vec<CandidateRecord>,
    pub next_page_url: Option<String>,
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("malformed listing: {0}")]
    MalformedRecord(String),
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("{0}")]
    Message(String),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// Display name written into `Listing::platform`.
    fn platform(&self) -> &'static str;

    fn access(&self) -> Access;

    fn first_page_url(&self) -> String;

    /// Extract records from one fetched page. Malformed records are skipped
    /// and counted, never returned as an error.
    fn parse_page(
        &self,
        ctx: &AdapterContext,
        page_url: &str,
        body: &str,
    ) -> Result<ParsedPage, AdapterError>;

    async fn fetch_page(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        url: &str,
    ) -> Result<String, AdapterError> {
        Ok(http.fetch(ctx.run_id, self.source_id(), url).await?.text())
    }

    /// Hook for adapters that visit detail pages after a listing page.
    async fn enrich(
        &self,
        _http: &HttpFetcher,
        _ctx: &AdapterContext,
        records: Vec<CandidateRecord>,
    ) -> Vec<CandidateRecord> {
        records
    }

    /// Walk result pages until `max_pages` is spent or no next page exists.
    async fn scrape_listings(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        max_pages: usize,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        let mut records = Vec::new();
        let mut next = Some(self.first_page_url());
        let mut page_no = 0usize;

        while let Some(url) = next.take() {
            if page_no >= max_pages {
                break;
            }
            page_no += 1;
            info!(source_id = self.source_id(), page = page_no, %url, "scraping page");

            let body = match self.fetch_page(http, ctx, &url).await {
                Ok(body) => body,
                Err(err) if page_no > 1 => {
                    warn!(source_id = self.source_id(), page = page_no, error = %err, "pagination stopped");
                    break;
                }
                Err(err) => return Err(err),
            };

            let parsed = match self.parse_page(ctx, &url, &body) {
                Ok(parsed) => parsed,
                Err(err) if page_no > 1 => {
                    warn!(source_id = self.source_id(), page = page_no, error = %err, "unparseable page, pagination stopped");
                    break;
                }
                Err(err) => return Err(err),
            };
            if parsed.skipped > 0 {
                warn!(
                    source_id = self.source_id(),
                    page = page_no,
                    skipped = parsed.skipped,
                    "skipped malformed listings"
                );
            }
            records.extend(self.enrich(http, ctx, parsed.records).await);
            next = parsed.next_page_url.filter(|candidate| *candidate != url);
        }

        Ok(records)
    }
}

/// Credentials and knobs needed to build adapters.
#[derive(Debug, Clone, Default)]
pub struct AdapterSettings {
    pub zyla_api_key: Option<String>,
}

/// Marketplaces scraped when no registry file names them explicitly.
pub fn default_source_order() -> Vec<&'static str> {
    vec![
        BIZBUYSELL.source_id,
        BIZQUEST.source_id,
        LOOPNET.source_id,
        DEALSTREAM.source_id,
        BUSINESSBROKER_NET.source_id,
    ]
}

pub fn adapter_for_source(
    source_id: &str,
    settings: &AdapterSettings,
) -> Option<Box<dyn SourceAdapter>> {
    let profile = match source_id {
        "bizbuysell" => BIZBUYSELL,
        "bizquest" => BIZQUEST,
        "loopnet" => LOOPNET,
        "dealstream" => DEALSTREAM,
        "businessbroker-net" => BUSINESSBROKER_NET,
        ZYLA_SOURCE_ID => {
            return Some(Box::new(ZylaApiAdapter::new(
                settings.zyla_api_key.clone().unwrap_or_default(),
            )))
        }
        _ => return None,
    };
    Some(Box::new(HtmlListingAdapter::new(profile)))
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn collapse_whitespace(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub(crate) fn select_first_text(
    scope: ElementRef<'_>,
    selector: &str,
) -> Result<Option<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(scope
        .select(&sel)
        .next()
        .and_then(|n| collapse_whitespace(&n.text().collect::<Vec<_>>().join(" "))))
}

pub(crate) fn select_first_attr(
    scope: ElementRef<'_>,
    selector: &str,
    attr: &str,
) -> Result<Option<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(scope
        .select(&sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .and_then(collapse_whitespace))
}

pub(crate) fn select_optional_text(
    scope: ElementRef<'_>,
    selector: Option<&str>,
) -> Result<Option<String>, AdapterError> {
    match selector {
        Some(selector) => select_first_text(scope, selector),
        None => Ok(None),
    }
}
