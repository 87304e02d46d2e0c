//! Address geocoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use jobboard_models::{Coordinates, Location};

use crate::error::{ApiError, ApiResult};

/// MapQuest geocoding API host.
pub const MAPQUEST_BASE_URL: &str = "https://www.mapquestapi.com";

/// Resolves a free-form address to a point.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> ApiResult<GeocodedAddress>;
}

/// First match for an address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub coordinates: Coordinates,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
}

impl GeocodedAddress {
    pub fn at(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            street: None,
            city: None,
            state: None,
            zipcode: None,
            country: None,
        }
    }

    /// GeoJSON location stored on a listing.
    pub fn into_location(self) -> Location {
        let mut location = Location::point(self.coordinates);
        location.formatted_address = self.street;
        location.city = self.city;
        location.state = self.state;
        location.zipcode = self.zipcode;
        location.country = self.country;
        location
    }
}

#[derive(Debug, Deserialize)]
struct MapQuestResponse {
    #[serde(default)]
    results: Vec<MapQuestResult>,
}

#[derive(Debug, Deserialize)]
struct MapQuestResult {
    #[serde(default)]
    locations: Vec<MapQuestLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapQuestLocation {
    lat_lng: LatLng,
    street: Option<String>,
    /// City
    admin_area5: Option<String>,
    /// State
    admin_area3: Option<String>,
    postal_code: Option<String>,
    /// Country
    admin_area1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// MapQuest geocoding client.
pub struct MapQuestGeocoder {
    api_key: String,
    base_url: String,
    client: Client,
}

impl MapQuestGeocoder {
    pub fn new(api_key: impl Into<String>) -> ApiResult<Self> {
        Self::with_base_url(api_key, MAPQUEST_BASE_URL)
    }

    /// Client against another host (tests, proxies).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to create geocoder client: {}", e)))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Geocoder for MapQuestGeocoder {
    async fn geocode(&self, address: &str) -> ApiResult<GeocodedAddress> {
        let url = format!("{}/geocoding/v1/address", self.base_url);
        debug!(address = %address, "Geocoding address");

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("location", address)])
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Geocoder request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Geocoder returned an error");
            return Err(ApiError::internal(format!("Geocoder error {}: {}", status, body)));
        }

        let parsed: MapQuestResponse = response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to parse geocoder response: {}", e)))?;

        let location = parsed
            .results
            .into_iter()
            .next()
            .and_then(|result| result.locations.into_iter().next())
            .ok_or_else(|| ApiError::bad_request(format!("Could not geocode address: {}", address)))?;

        Ok(GeocodedAddress {
            coordinates: Coordinates::new(location.lat_lng.lng, location.lat_lng.lat),
            street: non_empty(location.street),
            city: non_empty(location.admin_area5),
            state: non_empty(location.admin_area3),
            zipcode: non_empty(location.postal_code),
            country: non_empty(location.admin_area1),
        })
    }
}

/// Resolves every address to the same point.
#[derive(Debug, Clone)]
pub struct StaticGeocoder {
    coordinates: Coordinates,
}

impl StaticGeocoder {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        // Boston, MA
        Self::new(Coordinates::new(-71.0589, 42.3601))
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> ApiResult<GeocodedAddress> {
        let mut geocoded = GeocodedAddress::at(self.coordinates);
        geocoded.street = Some(address.to_string());
        Ok(geocoded)
    }
}
