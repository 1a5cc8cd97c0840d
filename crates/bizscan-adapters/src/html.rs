//! Marketplaces scraped from public HTML result pages.
//!
//! The sites differ only in where fields live on the page, so one adapter
//! type is driven by a per-site [`SiteProfile`] selector table.

use async_trait::async_trait;
use bizscan_core::{resolve_listing_url, CandidateRecord};
use bizscan_storage::HttpFetcher;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::{
    parse_selector, select_first_attr, select_first_text, select_optional_text, Access,
    AdapterContext, AdapterError, ParsedPage, SourceAdapter,
};

const REASON_SELECTOR: &str = ".reason-for-sale, [data-reason-for-sale]";

/// Selectors for a listing's own page, visited after the result page.
#[derive(Debug, Clone, Copy)]
pub struct DetailProfile {
    pub description: &'static str,
    pub industry: &'static str,
    pub reason_for_sale: &'static str,
    pub employees: &'static str,
    pub financials: &'static str,
    pub ownership: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub source_id: &'static str,
    pub platform: &'static str,
    pub base_url: &'static str,
    pub search_path: &'static str,
    pub listing: &'static str,
    pub title_link: &'static str,
    pub price: &'static str,
    pub location: &'static str,
    pub description: Option<&'static str>,
    pub industry: Option<&'static str>,
    pub reason_for_sale: Option<&'static str>,
    pub financials: Option<&'static str>,
    pub next_page: Option<&'static str>,
    pub detail: Option<DetailProfile>,
}

pub const BIZBUYSELL: SiteProfile = SiteProfile {
    source_id: "bizbuysell",
    platform: "BizBuySell",
    base_url: "https://www.bizbuysell.com",
    search_path: "/businesses-for-sale/New-York/New-York",
    listing: ".result-item",
    title_link: ".listing-title a",
    price: ".price",
    location: ".location",
    description: Some(".description"),
    industry: None,
    reason_for_sale: Some(REASON_SELECTOR),
    financials: None,
    next_page: Some("a.next"),
    detail: Some(DetailProfile {
        description: ".business-description",
        industry: ".industry",
        reason_for_sale: ".reason-for-sale",
        employees: ".employees",
        financials: ".financials",
        ownership: ".ownership",
    }),
};

pub const BIZQUEST: SiteProfile = SiteProfile {
    source_id: "bizquest",
    platform: "BizQuest",
    base_url: "https://www.bizquest.com",
    search_path: "/businesses-for-sale/new-york/",
    listing: ".listing-item",
    title_link: ".biz-title a",
    price: ".price",
    location: ".location",
    description: Some(".description"),
    industry: Some(".industry"),
    reason_for_sale: Some(REASON_SELECTOR),
    financials: Some(".financials"),
    next_page: Some("a.pagination-next"),
    detail: None,
};

pub const LOOPNET: SiteProfile = SiteProfile {
    source_id: "loopnet",
    platform: "LoopNet",
    base_url: "https://www.loopnet.com",
    search_path: "/search/businesses-for-sale/new-york-ny/",
    listing: ".placard",
    title_link: ".placard-title a",
    price: ".placard-price",
    location: ".placard-address",
    description: Some(".placard-property-type"),
    industry: None,
    reason_for_sale: Some(REASON_SELECTOR),
    financials: None,
    next_page: Some("a[aria-label='Next']"),
    detail: None,
};

pub const DEALSTREAM: SiteProfile = SiteProfile {
    source_id: "dealstream",
    platform: "DealStream",
    base_url: "https://www.dealstream.com",
    search_path: "/businesses-for-sale/New-York",
    listing: ".deal-listing",
    title_link: ".deal-title a",
    price: ".deal-price",
    location: ".deal-location",
    description: Some(".deal-description"),
    industry: None,
    reason_for_sale: Some(REASON_SELECTOR),
    financials: None,
    next_page: Some(".next-page"),
    detail: None,
};

pub const BUSINESSBROKER_NET: SiteProfile = SiteProfile {
    source_id: "businessbroker-net",
    platform: "BusinessBroker.net",
    base_url: "https://www.businessbroker.net",
    search_path: "/businesses-for-sale/new-york",
    listing: "div.business-listing",
    title_link: "a.business-title",
    price: "span.price",
    location: "span.location",
    description: Some("div.description"),
    industry: None,
    reason_for_sale: Some(REASON_SELECTOR),
    financials: None,
    next_page: None,
    detail: None,
};

#[derive(Debug, Clone)]
pub struct HtmlListingAdapter {
    profile: SiteProfile,
    base_url: String,
}

impl HtmlListingAdapter {
    pub fn new(profile: SiteProfile) -> Self {
        Self {
            base_url: profile.base_url.to_string(),
            profile,
        }
    }

    /// Point the adapter at a different host (mirrors, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn extract_record(
        &self,
        ctx: &AdapterContext,
        element: ElementRef<'_>,
    ) -> Result<CandidateRecord, AdapterError> {
        let profile = &self.profile;
        let name = select_first_text(element, profile.title_link)?
            .ok_or_else(|| AdapterError::MalformedRecord("missing title".into()))?;
        let href = select_first_attr(element, profile.title_link, "href")?
            .ok_or_else(|| AdapterError::MalformedRecord(format!("missing link for {name:?}")))?;

        let mut record = CandidateRecord::new(
            profile.source_id,
            profile.platform,
            self.base_url.clone(),
            name,
            href,
            ctx.fetched_at,
        );
        record.price_text = select_first_text(element, profile.price)?;
        record.address = select_first_text(element, profile.location)?;
        record.description = select_optional_text(element, profile.description)?;
        record.industry = select_optional_text(element, profile.industry)?;
        record.reason_for_sale = select_optional_text(element, profile.reason_for_sale)?;
        record.financials_text = select_optional_text(element, profile.financials)?;
        Ok(record)
    }

    /// Fill gaps in `record` from its detail page. Values found on the
    /// detail page win over the result-page snippet.
    pub fn apply_detail_page(
        &self,
        record: &mut CandidateRecord,
        body: &str,
    ) -> Result<(), AdapterError> {
        let Some(detail) = self.profile.detail else {
            return Ok(());
        };
        let document = Html::parse_document(body);
        let root = document.root_element();

        if let Some(v) = select_first_text(root, detail.description)? {
            record.description = Some(v);
        }
        if let Some(v) = select_first_text(root, detail.industry)? {
            record.industry = Some(v);
        }
        if let Some(v) = select_first_text(root, detail.reason_for_sale)? {
            record.reason_for_sale = Some(v);
        }
        if let Some(v) = select_first_text(root, detail.employees)? {
            record.employee_count_text = Some(v);
        }
        if let Some(v) = select_first_text(root, detail.financials)? {
            record.financials_text = Some(v);
        }
        if let Some(v) = select_first_text(root, detail.ownership)? {
            record.ownership_structure = Some(v);
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for HtmlListingAdapter {
    fn source_id(&self) -> &'static str {
        self.profile.source_id
    }

    fn platform(&self) -> &'static str {
        self.profile.platform
    }

    fn access(&self) -> Access {
        Access::PublicHtml
    }

    fn first_page_url(&self) -> String {
        format!("{}{}", self.base_url, self.profile.search_path)
    }

    fn parse_page(
        &self,
        ctx: &AdapterContext,
        page_url: &str,
        body: &str,
    ) -> Result<ParsedPage, AdapterError> {
        let document = Html::parse_document(body);
        let container = parse_selector(self.profile.listing)?;

        let mut page = ParsedPage::default();
        for (index, element) in document.select(&container).enumerate() {
            match self.extract_record(ctx, element) {
                Ok(record) => page.records.push(record),
                Err(err) => {
                    page.skipped += 1;
                    warn!(source_id = self.profile.source_id, index, error = %err, "skipping listing");
                }
            }
        }

        if let Some(next) = self.profile.next_page {
            page.next_page_url = select_first_attr(document.root_element(), next, "href")?
                .map(|href| resolve_listing_url(page_url, &href));
        }

        debug!(
            source_id = self.profile.source_id,
            records = page.records.len(),
            has_next = page.next_page_url.is_some(),
            "parsed result page"
        );
        Ok(page)
    }

    async fn enrich(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        mut records: Vec<CandidateRecord>,
    ) -> Vec<CandidateRecord> {
        if self.profile.detail.is_none() {
            return records;
        }
        for record in &mut records {
            let url = resolve_listing_url(&record.base_url, &record.listing_href);
            let outcome = match self.fetch_page(http, ctx, &url).await {
                Ok(body) => self.apply_detail_page(record, &body),
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                warn!(source_id = self.profile.source_id, %url, error = %err, "detail page unavailable");
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn ctx() -> AdapterContext {
        AdapterContext {
            run_id: Uuid::nil(),
            fetched_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).single().unwrap(),
        }
    }

    const BIZQUEST_PAGE: &str = r#"
        <html><body>
          <div class="listing-item">
            <h3 class="biz-title"><a href="/business-for-sale/precision-machining/BW1001/">Precision Machining Shop</a></h3>
            <span class="price">$2,750,000</span>
            <span class="location">Long Island City, NY</span>
            <p class="description">Specialized CNC manufacturing with long-tenured staff.</p>
            <span class="industry">Manufacturing</span>
            <span class="reason-for-sale">Owner retiring after 30 years</span>
            <span class="financials">Asking 4.1x cash flow</span>
          </div>
          <div class="listing-item">
            <span class="price">$900,000</span>
            <span class="location">Bronx, NY</span>
          </div>
          <div class="listing-item">
            <h3 class="biz-title"><a href="https://www.bizquest.com/business-for-sale/laundromat/BW1002/">Corner Laundromat</a></h3>
            <span class="price">Price on Request</span>
          </div>
          <a class="pagination-next" href="?page=2">Next</a>
        </body></html>
    "#;

    #[test]
    fn result_page_skips_malformed_records() {
        let adapter = HtmlListingAdapter::new(BIZQUEST);
        let page = adapter
            .parse_page(&ctx(), "https://www.bizquest.com/businesses-for-sale/new-york/", BIZQUEST_PAGE)
            .unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.skipped, 1);

        let first = &page.records[0];
        assert_eq!(first.name, "Precision Machining Shop");
        assert_eq!(first.platform, "BizQuest");
        assert_eq!(first.listing_href, "/business-for-sale/precision-machining/BW1001/");
        assert_eq!(first.price_text.as_deref(), Some("$2,750,000"));
        assert_eq!(first.address.as_deref(), Some("Long Island City, NY"));
        assert_eq!(first.industry.as_deref(), Some("Manufacturing"));
        assert_eq!(first.reason_for_sale.as_deref(), Some("Owner retiring after 30 years"));
        assert_eq!(first.financials_text.as_deref(), Some("Asking 4.1x cash flow"));

        let second = &page.records[1];
        assert_eq!(second.address, None);
        assert_eq!(second.description, None);
        assert_eq!(second.price_text.as_deref(), Some("Price on Request"));
    }

    #[test]
    fn next_page_resolves_against_current_page() {
        let adapter = HtmlListingAdapter::new(BIZQUEST);
        let page = adapter
            .parse_page(&ctx(), "https://www.bizquest.com/businesses-for-sale/new-york/", BIZQUEST_PAGE)
            .unwrap();
        assert_eq!(
            page.next_page_url.as_deref(),
            Some("https://www.bizquest.com/businesses-for-sale/new-york/?page=2")
        );
    }

    #[test]
    fn sites_without_pagination_report_no_next_page() {
        let adapter = HtmlListingAdapter::new(BUSINESSBROKER_NET);
        let body = r#"
            <div class="business-listing">
              <a class="business-title" href="/listing/hvac-services/77">HVAC Services &amp; Maintenance</a>
              <span class="price">$1,850,000</span>
              <span class="location">White Plains, NY 10601</span>
              <div class="description">Commercial HVAC maintenance contracts</div>
            </div>
            <a class="next" href="/page/2">Next</a>
        "#;
        let page = adapter
            .parse_page(&ctx(), "https://www.businessbroker.net/businesses-for-sale/new-york", body)
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].name, "HVAC Services & Maintenance");
        assert!(page.next_page_url.is_none());
    }

    #[test]
    fn listings_without_a_link_are_skipped() {
        let adapter = HtmlListingAdapter::new(DEALSTREAM);
        let body = r#"
            <div class="deal-listing">
              <div class="deal-title"><a>No Link Deli</a></div>
              <div class="deal-price">$600,000</div>
            </div>
            <div class="deal-listing">
              <div class="deal-title"><a href="   ">Blank Link Bakery</a></div>
            </div>
            <div class="deal-listing">
              <div class="deal-title"><a href="/deal/harbor-marina">Harbor Marina</a></div>
            </div>
        "#;
        let page = adapter
            .parse_page(&ctx(), "https://www.dealstream.com/businesses-for-sale/New-York", body)
            .unwrap();
        assert_eq!(page.skipped, 2);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].listing_href, "/deal/harbor-marina");
    }

    #[test]
    fn empty_page_yields_no_records() {
        let adapter = HtmlListingAdapter::new(DEALSTREAM);
        let page = adapter
            .parse_page(&ctx(), "https://www.dealstream.com/businesses-for-sale/New-York", "<html></html>")
            .unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.skipped, 0);
    }

    #[test]
    fn detail_page_overrides_snippet_fields() {
        let adapter = HtmlListingAdapter::new(BIZBUYSELL);
        let mut record = CandidateRecord::new(
            "bizbuysell",
            "BizBuySell",
            "https://www.bizbuysell.com",
            "Industrial Equipment Rental",
            "/listing/42",
            ctx().fetched_at,
        );
        record.description = Some("short".into());
        let body = r#"
            <div class="business-description">Equipment rental yard serving contractors.</div>
            <div class="industry">Rental</div>
            <div class="reason-for-sale">Succession planning</div>
            <div class="employees">Employees: 8</div>
            <div class="financials">Listed at 4.2x SDE</div>
        "#;
        adapter.apply_detail_page(&mut record, body).unwrap();
        assert_eq!(record.description.as_deref(), Some("Equipment rental yard serving contractors."));
        assert_eq!(record.industry.as_deref(), Some("Rental"));
        assert_eq!(record.reason_for_sale.as_deref(), Some("Succession planning"));
        assert_eq!(record.employee_count_text.as_deref(), Some("Employees: 8"));
        assert_eq!(record.financials_text.as_deref(), Some("Listed at 4.2x SDE"));
        assert_eq!(record.ownership_structure, None);
    }

    #[test]
    fn every_profile_selector_parses() {
        for profile in [BIZBUYSELL, BIZQUEST, LOOPNET, DEALSTREAM, BUSINESSBROKER_NET] {
            for selector in [profile.listing, profile.title_link, profile.price, profile.location]
                .into_iter()
                .chain(profile.description)
                .chain(profile.industry)
                .chain(profile.reason_for_sale)
                .chain(profile.financials)
                .chain(profile.next_page)
            {
                assert!(parse_selector(selector).is_ok(), "{}: {selector}", profile.source_id);
            }
        }
    }
}
