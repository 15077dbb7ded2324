//! LocationIQ geocoding client
//!
//! - `GET {base}/search?q={city}&format=json&limit=1` for a city's bounding box
//! - `GET {base}/autocomplete?q={query}&viewbox=..&bounded=1` for suggestions

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::result::{Error, Result};
use crate::ports::{AddressSuggestion, BoundingBox, GeocodingClient};

const LOCATIONIQ_URL: &str = "https://api.locationiq.com/v1";

/// Suggestions requested per autocomplete call
const AUTOCOMPLETE_LIMIT: &str = "5";

#[derive(Debug, Deserialize)]
struct SearchResult {
    /// `[south, north, west, east]` as decimal strings
    boundingbox: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResult {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: AutocompleteAddress,
}

#[derive(Debug, Default, Deserialize)]
struct AutocompleteAddress {
    name: Option<String>,
    house_number: Option<String>,
    road: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    city: Option<String>,
    town: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

impl AutocompleteResult {
    fn into_suggestion(self) -> AddressSuggestion {
        let a = self.address;
        let street_address = match (a.house_number, a.road) {
            (Some(number), Some(road)) => Some(format!("{} {}", number, road)),
            (None, Some(road)) => Some(road),
            (_, None) => a.name,
        };
        AddressSuggestion {
            display_name: self.display_name,
            street_address,
            suburb: a.suburb.or(a.neighbourhood),
            city: a.city.or(a.town),
            postcode: a.postcode,
            country: a.country,
        }
    }
}

fn parse_bounding_box(raw: &[String]) -> Option<BoundingBox> {
    if raw.len() != 4 {
        return None;
    }
    let values: Vec<f64> = raw.iter().filter_map(|v| v.trim().parse().ok()).collect();
    if values.len() != 4 {
        return None;
    }
    Some(BoundingBox {
        min_lat: values[0],
        max_lat: values[1],
        min_lon: values[2],
        max_lon: values[3],
    })
}

/// LocationIQ API client
#[derive(Debug)]
pub struct LocationIqClient {
    client: Client,
    api_key: String,
    base_url: String,
    country_code: String,
}

impl LocationIqClient {
    pub fn new(api_key: &str, country_code: &str) -> Result<Self> {
        Self::new_with_base_url(api_key, country_code, LOCATIONIQ_URL)
    }

    pub fn new_with_base_url(api_key: &str, country_code: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "Geocoding API key cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            country_code: country_code.to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("format", "json")])
            .query(query)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Geocoding("Geocoding request timed out".to_string())
                } else {
                    Error::Geocoding(format!("Geocoding request failed: {}", e))
                }
            })?;

        match response.status().as_u16() {
            200 => {}
            401 => {
                return Err(Error::Geocoding(
                    "Geocoding authentication failed".to_string(),
                ))
            }
            404 => return Err(Error::Geocoding("No geocoding match".to_string())),
            429 => {
                return Err(Error::Geocoding(
                    "Geocoding rate limit exceeded".to_string(),
                ))
            }
            status => {
                return Err(Error::Geocoding(format!(
                    "Geocoding API error: HTTP {}",
                    status
                )))
            }
        }

        response
            .json()
            .map_err(|e| Error::Geocoding(format!("Failed to parse geocoding response: {}", e)))
    }
}

impl GeocodingClient for LocationIqClient {
    fn name(&self) -> &str {
        "locationiq"
    }

    fn city_bounds(&self, city: &str) -> Result<BoundingBox> {
        let results: Vec<SearchResult> = self.get_json(
            "search",
            &[
                ("q", city.to_string()),
                ("countrycodes", self.country_code.clone()),
                ("limit", "1".to_string()),
            ],
        )?;

        results
            .first()
            .and_then(|r| parse_bounding_box(&r.boundingbox))
            .ok_or_else(|| Error::Geocoding(format!("No bounding box for city '{}'", city)))
    }

    fn autocomplete(
        &self,
        query: &str,
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<AddressSuggestion>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("countrycodes", self.country_code.clone()),
            ("limit", AUTOCOMPLETE_LIMIT.to_string()),
        ];
        if let Some(bounds) = bounds {
            params.push(("viewbox", bounds.to_query()));
            params.push(("bounded", "1".to_string()));
        }

        let results: Vec<AutocompleteResult> = self.get_json("autocomplete", &params)?;
        Ok(results
            .into_iter()
            .map(AutocompleteResult::into_suggestion)
            .collect())
    }
}
