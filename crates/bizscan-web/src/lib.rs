//! Report rendering for scan results: a static askama dashboard plus an axum
//! server that always shows the newest results file in the output directory.

mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bizscan_core::{Listing, ResultSet, NO_MATCHES_REASON, OWNERSHIP_UNKNOWN};
use tokio::net::TcpListener;
use tracing::info;

pub use summary::{LaborCounts, PlatformCount, ReportSummary};

pub const CRATE_NAME: &str = "bizscan-web";

const RESULTS_PREFIX: &str = "business_listings_";

/// One listing with every value pre-formatted for display.
#[derive(Debug, Clone)]
struct ListingCard {
    name: String,
    platform: String,
    labor: &'static str,
    price_display: String,
    address: String,
    distance_display: String,
    visit_display: String,
    reason: String,
    multiple_display: Option<String>,
    ownership: Option<String>,
    ai_disruptability: String,
    ai_tag: &'static str,
    ai_class: &'static str,
    note: Option<String>,
    listing_url: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    scan_day: String,
    total: usize,
    avg_price_millions: String,
    low_labor: usize,
    duplicates_removed: usize,
    platform_counts: Vec<PlatformCount>,
    cards: Vec<ListingCard>,
    no_matches_reason: String,
}

#[derive(Template)]
#[template(path = "no_report.html")]
struct NoReportTemplate {
    reason: String,
    output_dir: String,
}

/// `1234567` -> `$1,234,567`.
pub fn format_money(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("${out}")
}

fn title_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ListingCard {
    fn from_listing(listing: &Listing) -> Self {
        let ai_lower = listing.ai_disruptability.to_lowercase();
        let (ai_tag, ai_class) = if ai_lower.contains("low") {
            ("Low AI Risk", "ai-low")
        } else if ai_lower.contains("high") {
            ("High AI Risk", "ai-high")
        } else {
            ("Medium AI Risk", "ai-medium")
        };

        Self {
            name: listing.name.clone(),
            platform: listing.platform.clone(),
            labor: listing.labor_intensity.as_str(),
            price_display: if listing.price_disclosed() {
                format_money(listing.price)
            } else {
                "Price on request".to_string()
            },
            address: listing.address.clone(),
            distance_display: match listing.distance_miles {
                Some(miles) => format!("{miles:.1} miles"),
                None => "Distance unknown".to_string(),
            },
            visit_display: title_case(listing.visit_frequency.as_str()),
            reason: title_case(&listing.reason_for_sale),
            multiple_display: (listing.earnings_multiple > 0.0)
                .then(|| format!("{}x", listing.earnings_multiple)),
            ownership: (listing.ownership_structure != OWNERSHIP_UNKNOWN)
                .then(|| listing.ownership_structure.clone()),
            ai_disruptability: listing.ai_disruptability.clone(),
            ai_tag,
            ai_class,
            note: listing.partial_match_explanation.clone(),
            listing_url: listing.listing_url.clone(),
        }
    }
}

/// Self-contained HTML dashboard for one result set.
pub fn render_dashboard(set: &ResultSet) -> Result<String> {
    let summary = ReportSummary::from_result_set(set);
    let tpl = DashboardTemplate {
        scan_day: set.scan_date.format("%Y-%m-%d").to_string(),
        total: summary.total_results,
        avg_price_millions: format!("{:.1}", summary.avg_price / 1_000_000.0),
        low_labor: summary.labor_counts.low,
        duplicates_removed: summary.duplicates_removed,
        platform_counts: summary.platform_counts,
        cards: set.results.iter().map(ListingCard::from_listing).collect(),
        no_matches_reason: set.no_matches_reason.clone(),
    };
    tpl.render().context("rendering dashboard")
}

pub async fn load_result_set(path: &Path) -> Result<ResultSet> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// Newest `business_listings_YYYYMMDD.json` in `dir`, by date in the name.
pub async fn latest_results_file(dir: &Path) -> Result<Option<PathBuf>> {
    if !tokio::fs::try_exists(dir)
        .await
        .with_context(|| format!("checking {}", dir.display()))?
    {
        return Ok(None);
    }
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    let mut newest: Option<(String, PathBuf)> = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("reading {}", dir.display()))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(RESULTS_PREFIX) || !name.ends_with(".json") {
            continue;
        }
        let is_newer = match &newest {
            Some((best, _)) => name > *best,
            None => true,
        };
        if is_newer {
            newest = Some((name, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

async fn load_latest(dir: &Path) -> Result<Option<ResultSet>> {
    match latest_results_file(dir).await? {
        Some(path) => Ok(Some(load_result_set(&path).await?)),
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/results", get(results_handler))
        .route("/api/summary", get(summary_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!(port, output_dir = %state.output_dir.display(), "serving dashboard");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_latest(&state.output_dir).await {
        Ok(Some(set)) => match render_dashboard(&set) {
            Ok(html) => Html(html).into_response(),
            Err(err) => server_error(err),
        },
        Ok(None) => {
            let tpl = NoReportTemplate {
                reason: NO_MATCHES_REASON.to_string(),
                output_dir: state.output_dir.display().to_string(),
            };
            let mut resp = render_html(tpl);
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
        Err(err) => server_error(err),
    }
}

async fn results_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_latest(&state.output_dir).await {
        Ok(Some(set)) => Json(set).into_response(),
        Ok(None) => not_found_json(),
        Err(err) => server_error(err),
    }
}

async fn summary_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_latest(&state.output_dir).await {
        Ok(Some(set)) => Json(ReportSummary::from_result_set(&set)).into_response(),
        Ok(None) => not_found_json(),
        Err(err) => server_error(err),
    }
}

fn not_found_json() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "no scan results yet", "no_matches_reason": NO_MATCHES_REASON })),
    )
        .into_response()
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {err:#}")),
    )
        .into_response()
}
