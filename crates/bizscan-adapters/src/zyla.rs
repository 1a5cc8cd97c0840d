//! BizBuySell listings through the Zyla API Hub JSON endpoint.

use async_trait::async_trait;
use bizscan_core::{resolve_listing_url, CandidateRecord};
use bizscan_storage::HttpFetcher;
use serde_json::Value as JsonValue;
use tracing::warn;
use url::Url;

use crate::{collapse_whitespace, Access, AdapterContext, AdapterError, ParsedPage, SourceAdapter};

pub const ZYLA_SOURCE_ID: &str = "zyla-api";
const ZYLA_PLATFORM: &str = "BizBuySell (via Zyla API)";

const ZYLA_BASE_URL: &str = "https://zylalabs.com/api";
const ZYLA_PRICE_CEILING: &str = "5000000";

#[derive(Debug, Clone)]
pub struct ZylaApiAdapter {
    api_key: String,
    base_url: String,
    location: String,
    max_results: usize,
}

impl ZylaApiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ZYLA_BASE_URL.to_string(),
            location: "New York".to_string(),
            max_results: 100,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn record_from_json(
        &self,
        ctx: &AdapterContext,
        raw: &JsonValue,
    ) -> Result<CandidateRecord, AdapterError> {
        let name = json_text(raw, "business_name")
            .ok_or_else(|| AdapterError::MalformedRecord("missing business_name".into()))?;
        let href = json_text(raw, "listing_url")
            .ok_or_else(|| AdapterError::MalformedRecord("missing listing_url".into()))?;

        let mut record = CandidateRecord::new(
            ZYLA_SOURCE_ID,
            ZYLA_PLATFORM,
            "https://www.bizbuysell.com",
            name,
            href,
            ctx.fetched_at,
        );
        record.address = json_text(raw, "location");
        record.price_text = json_text(raw, "asking_price");
        record.description = json_text(raw, "description");
        record.industry = json_text(raw, "industry");
        record.reason_for_sale = json_text(raw, "reason_for_sale");
        record.employee_count_text = json_text(raw, "employees");
        record.ownership_structure = json_text(raw, "ownership_type");
        record.earnings_multiple = json_number(raw, "earnings_multiple");
        Ok(record)
    }
}

/// String or number field rendered as trimmed text.
fn json_text(value: &JsonValue, key: &str) -> Option<String> {
    match value.get(key)? {
        JsonValue::String(s) => collapse_whitespace(s),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric field, also accepted when the API sends it as a string.
fn json_number(value: &JsonValue, key: &str) -> Option<f64> {
    match value.get(key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for ZylaApiAdapter {
    fn source_id(&self) -> &'static str {
        ZYLA_SOURCE_ID
    }

    fn platform(&self) -> &'static str {
        ZYLA_PLATFORM
    }

    fn access(&self) -> Access {
        Access::Api
    }

    fn first_page_url(&self) -> String {
        let endpoint = format!("{}/bizbuysell-listings", self.base_url);
        let limit = self.max_results.to_string();
        match Url::parse_with_params(
            &endpoint,
            &[
                ("location", self.location.as_str()),
                ("limit", limit.as_str()),
                ("price_max", ZYLA_PRICE_CEILING),
            ],
        ) {
            Ok(url) => url.to_string(),
            Err(_) => endpoint,
        }
    }

    fn parse_page(
        &self,
        ctx: &AdapterContext,
        page_url: &str,
        body: &str,
    ) -> Result<ParsedPage, AdapterError> {
        let payload: JsonValue = serde_json::from_str(body)
            .map_err(|e| AdapterError::Payload(format!("invalid listings JSON: {e}")))?;
        let listings = payload
            .get("listings")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| AdapterError::Payload("response has no listings array".into()))?;

        let mut page = ParsedPage::default();
        for (index, raw) in listings.iter().enumerate() {
            match self.record_from_json(ctx, raw) {
                Ok(record) => page.records.push(record),
                Err(err) => {
                    page.skipped += 1;
                    warn!(source_id = ZYLA_SOURCE_ID, index, error = %err, "skipping listing");
                }
            }
        }
        page.next_page_url = payload
            .get("next")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(|next| resolve_listing_url(page_url, next));
        Ok(page)
    }

    async fn fetch_page(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        url: &str,
    ) -> Result<String, AdapterError> {
        if self.api_key.trim().is_empty() {
            return Err(AdapterError::Message("ZYLA_API_KEY is not configured".into()));
        }
        Ok(http
            .fetch_with_bearer(ctx.run_id, ZYLA_SOURCE_ID, url, &self.api_key)
            .await?
            .text())
    }
}
