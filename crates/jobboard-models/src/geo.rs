//! GeoJSON points and spherical distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Angular distance to `other`, in radians (haversine).
    pub fn central_angle(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.longitude - self.longitude).to_radians();
        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }

    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        self.central_angle(other) * EARTH_RADIUS_KM
    }
}

/// Radius in radians for a distance in kilometres.
pub fn radius_for_km(distance_km: f64) -> f64 {
    distance_km / EARTH_RADIUS_KM
}

/// Geocoded address stored on a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub fn point(at: Coordinates) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [at.longitude, at.latitude],
            formatted_address: None,
            city: None,
            state: None,
            zipcode: None,
            country: None,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.coordinates[0], self.coordinates[1])
    }

    /// Whether this point lies inside the spherical cap around `center`.
    pub fn within(&self, center: &Coordinates, radius_radians: f64) -> bool {
        center.central_angle(&self.coordinates()) <= radius_radians
    }
}
