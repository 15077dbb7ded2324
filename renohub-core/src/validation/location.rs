//! Location form validation

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::common::{char_len, is_valid_name, optional, required_text};
use super::{Field, ValidationErrors};
use crate::domain::Location;

pub const STREET_MAX: usize = 128;
pub const PLACE_MAX: usize = 64;

pub const SUBURB_INVALID: &str =
    "Suburb must only include letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const CITY_INVALID: &str = "City must only include letters, spaces, hyphens or apostrophes";
pub const POSTCODE_INVALID: &str = "Postcode must be 3 to 10 letters or digits";
pub const COUNTRY_INVALID: &str = "Country must only include letters and spaces";

fn city_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}\p{M} '\-]+$").expect("city pattern"))
}

fn country_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}\p{M} ]+$").expect("country pattern"))
}

fn postcode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{3,10}$").expect("postcode pattern"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationForm {
    pub street_address: String,
    #[serde(default)]
    pub suburb: String,
    pub city: String,
    #[serde(default)]
    pub postcode: String,
    pub country: String,
}

pub fn validate_location(form: &LocationForm) -> Result<Location, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let street = required_text(
        &mut errors,
        Field::StreetAddress,
        &form.street_address,
        "Street address",
        STREET_MAX,
    );

    let suburb = optional(&form.suburb).map(str::to_string);
    if let Some(s) = &suburb {
        if char_len(s) > PLACE_MAX {
            errors.add(Field::Suburb, "Suburb must be 64 characters or less");
        } else if !is_valid_name(s) {
            errors.add(Field::Suburb, SUBURB_INVALID);
        }
    }

    let city = required_text(&mut errors, Field::City, &form.city, "City", PLACE_MAX);
    if let Some(c) = &city {
        if !city_re().is_match(c) {
            errors.add(Field::City, CITY_INVALID);
        }
    }

    let postcode = optional(&form.postcode).map(str::to_string);
    if let Some(p) = &postcode {
        if !postcode_re().is_match(p) {
            errors.add(Field::Postcode, POSTCODE_INVALID);
        }
    }

    let country = required_text(&mut errors, Field::Country, &form.country, "Country", PLACE_MAX);
    if let Some(c) = &country {
        if !country_re().is_match(c) {
            errors.add(Field::Country, COUNTRY_INVALID);
        }
    }

    match (street, city, country) {
        (Some(street_address), Some(city), Some(country)) if errors.is_empty() => Ok(Location {
            street_address,
            suburb,
            city,
            postcode,
            country,
        }),
        _ => Err(errors),
    }
}

impl From<&Location> for LocationForm {
    fn from(location: &Location) -> Self {
        Self {
            street_address: location.street_address.clone(),
            suburb: location.suburb.clone().unwrap_or_default(),
            city: location.city.clone(),
            postcode: location.postcode.clone().unwrap_or_default(),
            country: location.country.clone(),
        }
    }
}
