//! Distance from the fixed reference address, via Nominatim (OpenStreetMap).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bizscan_adapters::AdapterContext;
use bizscan_core::LOCATION_NOT_SPECIFIED;
use bizscan_storage::HttpFetcher;
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use url::Url;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const REFERENCE_ADDRESS: &str = "37 Warren Street, New York, NY 10007";
pub const REFERENCE_FALLBACK: GeoPoint = GeoPoint {
    latitude: 40.7112,
    longitude: -74.0055,
};

const EARTH_RADIUS_MILES: f64 = 3958.8;
const GEOCODER_SOURCE_ID: &str = "nominatim";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Great-circle distance in miles (haversine).
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Distance collaborator. `None` means unknown; lookups never fail the scan.
#[async_trait]
pub trait DistanceLookup: Send + Sync {
    async fn distance_miles(&self, ctx: &AdapterContext, address: &str) -> Option<f64>;
}

/// Offline runs: every distance is unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDistance;

#[async_trait]
impl DistanceLookup for NoDistance {
    async fn distance_miles(&self, _ctx: &AdapterContext, _address: &str) -> Option<f64> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

pub struct NominatimDistance {
    http: Arc<HttpFetcher>,
    base_url: String,
    reference_address: String,
    reference: OnceCell<GeoPoint>,
    cache: Mutex<HashMap<String, Option<f64>>>,
}

impl NominatimDistance {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self {
            http,
            base_url: NOMINATIM_URL.to_string(),
            reference_address: REFERENCE_ADDRESS.to_string(),
            reference: OnceCell::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn geocode(&self, ctx: &AdapterContext, query: &str) -> Result<GeoPoint> {
        let url = Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("q", query), ("format", "json"), ("limit", "1")],
        )
        .context("building geocoder url")?;
        let response = self
            .http
            .fetch(ctx.run_id, GEOCODER_SOURCE_ID, url.as_str())
            .await
            .with_context(|| format!("geocoding {query:?}"))?;
        let places: Vec<NominatimPlace> =
            serde_json::from_slice(&response.body).context("parsing geocoder response")?;
        let place = places
            .first()
            .ok_or_else(|| anyhow!("location not found: {query}"))?;

        Ok(GeoPoint {
            latitude: place.lat.parse().context("invalid latitude")?,
            longitude: place.lon.parse().context("invalid longitude")?,
        })
    }

    /// Reference point, geocoded once per instance.
    async fn reference_point(&self, ctx: &AdapterContext) -> GeoPoint {
        *self
            .reference
            .get_or_init(|| async {
                match self.geocode(ctx, &self.reference_address).await {
                    Ok(point) => point,
                    Err(err) => {
                        warn!(error = %err, "reference address not geocoded, using fallback coordinates");
                        REFERENCE_FALLBACK
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl DistanceLookup for NominatimDistance {
    async fn distance_miles(&self, ctx: &AdapterContext, address: &str) -> Option<f64> {
        let address = address.trim();
        if address.is_empty() || address == LOCATION_NOT_SPECIFIED {
            return None;
        }
        if let Some(cached) = self.cache.lock().await.get(address) {
            return *cached;
        }

        let reference = self.reference_point(ctx).await;
        let miles = match self.geocode(ctx, address).await {
            Ok(point) => {
                let miles = (haversine_miles(reference, point) * 10.0).round() / 10.0;
                debug!(address, miles, "distance resolved");
                Some(miles)
            }
            Err(err) => {
                warn!(address, error = %err, "distance unknown");
                None
            }
        };
        self.cache.lock().await.insert(address.to_string(), miles);
        miles
    }
}
