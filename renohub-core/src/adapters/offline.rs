//! Offline adapters used when an external service is disabled in settings

use crate::domain::result::Result;
use crate::ports::{AddressSuggestion, BoundingBox, GeocodingClient, ModerationClient};

/// Moderation client that never flags anything
#[derive(Debug, Default)]
pub struct PassThroughModerator;

impl ModerationClient for PassThroughModerator {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn is_offline(&self) -> bool {
        true
    }

    fn score(&self, _text: &str) -> Result<f64> {
        Ok(0.0)
    }
}

/// Geocoder without network access: every city maps to the default city
/// and autocomplete finds nothing
#[derive(Debug, Default)]
pub struct StaticGeocoder;

impl GeocodingClient for StaticGeocoder {
    fn name(&self) -> &str {
        "static"
    }

    fn is_offline(&self) -> bool {
        true
    }

    fn city_bounds(&self, _city: &str) -> Result<BoundingBox> {
        Ok(BoundingBox::DEFAULT_CITY)
    }

    fn autocomplete(
        &self,
        _query: &str,
        _bounds: Option<BoundingBox>,
    ) -> Result<Vec<AddressSuggestion>> {
        Ok(Vec::new())
    }
}
