//! Renovation record and room validation

use serde::{Deserialize, Serialize};

use super::common::{fold, is_valid_name, required_text};
use super::location::{validate_location, LocationForm};
use super::{Field, ValidationErrors};
use crate::domain::Location;

pub const NAME_MAX: usize = 64;
pub const DESCRIPTION_MAX: usize = 512;
pub const ROOM_NAME_MAX: usize = 64;

pub const RECORD_NAME_INVALID: &str =
    "Renovation record name must only include letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const RECORD_NAME_TAKEN: &str = "A renovation record with this name already exists";
pub const ROOM_NAME_INVALID: &str =
    "Room name must only include letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const ROOM_NAME_TAKEN: &str = "A room with this name already exists in this renovation record";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordForm {
    pub name: String,
    pub description: String,
    pub location: LocationForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub name: String,
    pub description: String,
    pub location: Location,
}

/// Validate a record form. `other_names` are the owner's other record
/// names (the record being edited excluded); comparison ignores case and
/// diacritics.
pub fn validate_record(
    form: &RecordForm,
    other_names: &[String],
) -> Result<ParsedRecord, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = required_text(
        &mut errors,
        Field::Name,
        &form.name,
        "Renovation record name",
        NAME_MAX,
    );
    if let Some(n) = &name {
        if !is_valid_name(n) {
            errors.add(Field::Name, RECORD_NAME_INVALID);
        } else {
            let key = fold(n);
            if other_names.iter().any(|other| fold(other.trim()) == key) {
                errors.add(Field::Name, RECORD_NAME_TAKEN);
            }
        }
    }

    let description = required_text(
        &mut errors,
        Field::Description,
        &form.description,
        "Renovation record description",
        DESCRIPTION_MAX,
    );

    let location = match validate_location(&form.location) {
        Ok(location) => Some(location),
        Err(e) => {
            errors.extend(e);
            None
        }
    };

    match (name, description, location) {
        (Some(name), Some(description), Some(location)) if errors.is_empty() => Ok(ParsedRecord {
            name,
            description,
            location,
        }),
        _ => Err(errors),
    }
}

/// Validate a room name against the record's existing room names
pub fn validate_room_name(input: &str, existing: &[String]) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = required_text(&mut errors, Field::Room, input, "Room name", ROOM_NAME_MAX);
    if let Some(n) = &name {
        if !is_valid_name(n) {
            errors.add(Field::Room, ROOM_NAME_INVALID);
        } else if existing.iter().any(|e| fold(e) == fold(n)) {
            errors.add(Field::Room, ROOM_NAME_TAKEN);
        }
    }
    match name {
        Some(name) if errors.is_empty() => Ok(name),
        _ => Err(errors),
    }
}
