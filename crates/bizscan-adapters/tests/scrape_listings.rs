//! `scrape_listings` against a local wiremock marketplace: pagination budget,
//! detail-page enrichment and failure boundaries.

use std::time::Duration;

use bizscan_adapters::{
    AdapterContext, AdapterError, HtmlListingAdapter, SourceAdapter, ZylaApiAdapter, BIZBUYSELL,
    DEALSTREAM,
};
use bizscan_storage::{BackoffPolicy, FetcherConfig, HttpFetcher};
use chrono::{TimeZone, Utc};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_fetcher() -> HttpFetcher {
    HttpFetcher::new(FetcherConfig {
        timeout: Duration::from_secs(5),
        user_agent: "bizscan-test/0.1".into(),
        request_interval: Duration::ZERO,
        backoff: BackoffPolicy::none(),
    })
    .expect("failed to build test fetcher")
}

fn ctx() -> AdapterContext {
    AdapterContext {
        run_id: Uuid::nil(),
        fetched_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).single().unwrap(),
    }
}

fn dealstream_page(title: &str, next: Option<&str>) -> String {
    let next_link = next
        .map(|href| format!(r#"<a class="next-page" href="{href}">Next</a>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body>
          <div class="deal-listing">
            <div class="deal-title"><a href="/deal/{slug}">{title}</a></div>
            <div class="deal-price">$1,000,000</div>
            <div class="deal-location">Brooklyn, NY</div>
            <div class="deal-description">Storage facility</div>
          </div>
          {next_link}
        </body></html>"#,
        slug = title.to_lowercase().replace(' ', "-"),
    )
}

async fn mount_page(server: &MockServer, page: Option<&str>, body: String) {
    let mock = Mock::given(method("GET")).and(path("/businesses-for-sale/New-York"));
    let mock = match page {
        Some(page) => mock.and(query_param("page", page)),
        None => mock,
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn pagination_stops_at_page_budget() {
    let server = MockServer::start().await;
    // Mounted first so the page-specific mocks win over the bare path.
    mount_page(&server, Some("3"), dealstream_page("Third Deal", Some("?page=4"))).await;
    mount_page(&server, Some("2"), dealstream_page("Second Deal", Some("?page=3"))).await;
    mount_page(&server, None, dealstream_page("First Deal", Some("?page=2"))).await;

    let adapter = HtmlListingAdapter::new(DEALSTREAM).with_base_url(server.uri());
    let records = adapter
        .scrape_listings(&test_fetcher(), &ctx(), 2)
        .await
        .expect("scrape succeeds");

    let names = records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["First Deal", "Second Deal"]);
    assert!(records.iter().all(|r| r.base_url == server.uri()));
}

#[tokio::test]
async fn zero_page_budget_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = HtmlListingAdapter::new(DEALSTREAM).with_base_url(server.uri());
    let records = adapter.scrape_listings(&test_fetcher(), &ctx(), 0).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn failing_later_page_keeps_earlier_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/businesses-for-sale/New-York"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, None, dealstream_page("First Deal", Some("?page=2"))).await;

    let adapter = HtmlListingAdapter::new(DEALSTREAM).with_base_url(server.uri());
    let records = adapter.scrape_listings(&test_fetcher(), &ctx(), 5).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn failing_first_page_is_an_adapter_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let adapter = HtmlListingAdapter::new(DEALSTREAM).with_base_url(server.uri());
    let err = adapter
        .scrape_listings(&test_fetcher(), &ctx(), 3)
        .await
        .expect_err("first page failure propagates");
    assert!(matches!(err, AdapterError::Fetch(_)));
}

#[tokio::test]
async fn detail_pages_fill_reason_and_employees() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/businesses-for-sale/New-York/New-York"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="result-item">
                 <h2 class="listing-title"><a href="/listing/pizza-1">Joe's Pizza</a></h2>
                 <span class="price">$450,000</span>
                 <span class="location">123 Main St, New York, NY</span>
               </div>
               <div class="result-item">
                 <h2 class="listing-title"><a href="/listing/gone-2">Vanished Deli</a></h2>
                 <span class="price">$300,000</span>
               </div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listing/pizza-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="business-description">Neighborhood restaurant</div>
               <div class="industry">Restaurants</div>
               <div class="reason-for-sale">Owner is retiring</div>
               <div class="employees">12 employees</div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listing/gone-2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = HtmlListingAdapter::new(BIZBUYSELL).with_base_url(server.uri());
    let records = adapter.scrape_listings(&test_fetcher(), &ctx(), 1).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].reason_for_sale.as_deref(), Some("Owner is retiring"));
    assert_eq!(records[0].employee_count_text.as_deref(), Some("12 employees"));
    assert_eq!(records[0].industry.as_deref(), Some("Restaurants"));
    assert_eq!(records[1].name, "Vanished Deli");
    assert_eq!(records[1].reason_for_sale, None);
}

#[tokio::test]
async fn api_adapter_without_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = ZylaApiAdapter::new("").with_base_url(server.uri());
    let err = adapter
        .scrape_listings(&test_fetcher(), &ctx(), 1)
        .await
        .expect_err("missing key");
    assert!(matches!(err, AdapterError::Message(_)));
}

#[tokio::test]
async fn api_adapter_reads_listings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bizbuysell-listings"))
        .and(query_param("price_max", "5000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json_body()))
        .mount(&server)
        .await;

    let adapter = ZylaApiAdapter::new("key").with_base_url(server.uri());
    let records = adapter.scrape_listings(&test_fetcher(), &ctx(), 3).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Precision Manufacturing Co.");
    assert_eq!(records[0].price_text.as_deref(), Some("2750000"));
    assert_eq!(records[0].earnings_multiple, Some(4.1));
}

fn serde_json_body() -> serde_json::Value {
    serde_json::json!({
        "listings": [{
            "business_name": "Precision Manufacturing Co.",
            "location": "Long Island City, NY 11101",
            "asking_price": 2750000,
            "earnings_multiple": 4.1,
            "reason_for_sale": "retirement",
            "listing_url": "https://www.bizbuysell.com/listing/precision-manufacturing/2"
        }]
    })
}
