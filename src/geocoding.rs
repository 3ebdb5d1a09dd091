//! Address geocoding through Nominatim (OpenStreetMap).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::Geocode;

/// Resolves a free-text address to coordinates and postal information.
/// A lookup that finds nothing is `Ok(None)`; only transport-level
/// failures are errors, and callers treat both as a miss.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    async fn lookup(&self, address: &str) -> Result<Option<Geocode>>;
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    postcode: Option<String>,
}

pub struct NominatimClient {
    client: reqwest::Client,
}

impl NominatimClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; listing-sync/0.1)")
            .build()
            .context("Failed to create geocoding HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GeocodingService for NominatimClient {
    async fn lookup(&self, address: &str) -> Result<Option<Geocode>> {
        let url = format!(
            "https://nominatim.openstreetmap.org/search?q={}&format=json&addressdetails=1&limit=1",
            urlencoding::encode(address)
        );

        debug!(%address, "geocoding address");

        let results: Vec<NominatimResult> = self
            .client
            .get(&url)
            .send()
            .await
            .context("Geocoding request failed")?
            .error_for_status()
            .context("Geocoding request rejected")?
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        let Some(result) = results.into_iter().next() else {
            warn!(%address, "no geocoding result for address");
            return Ok(None);
        };

        let latitude: f64 = result.lat.parse().context("Invalid latitude in response")?;
        let longitude: f64 = result.lon.parse().context("Invalid longitude in response")?;
        let postal_code = result.address.postcode;
        let fsa = fsa_of(postal_code.as_deref());

        Ok(Some(Geocode {
            latitude,
            longitude,
            postal_code,
            fsa,
        }))
    }
}

/// Forward sortation area: the first three characters of a Canadian postal
/// code, when a full code is available.
pub fn fsa_of(postal_code: Option<&str>) -> Option<String> {
    let code = postal_code?;
    if code.chars().count() > 3 {
        Some(code.chars().take(3).collect())
    } else {
        None
    }
}
