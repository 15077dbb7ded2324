//! Geocoding port - address autocomplete and city bounds

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;

/// Rectangular search area in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Christchurch, New Zealand
    pub const DEFAULT_CITY: BoundingBox = BoundingBox {
        min_lon: 172.3930,
        min_lat: -43.6350,
        max_lon: 172.8130,
        max_lat: -43.3900,
    };

    /// `min_lon,min_lat,max_lon,max_lat` as used in query strings
    pub fn to_query(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// One autocomplete result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub display_name: String,
    pub street_address: Option<String>,
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

/// Address lookups against an external geocoder
pub trait GeocodingClient: Send + Sync {
    fn name(&self) -> &str;

    /// Offline stand-ins answer locally and need no call spacing
    fn is_offline(&self) -> bool {
        false
    }

    /// Bounding box of a named city
    fn city_bounds(&self, city: &str) -> Result<BoundingBox>;

    /// Autocomplete, optionally restricted to `bounds`
    fn autocomplete(
        &self,
        query: &str,
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<AddressSuggestion>>;
}
