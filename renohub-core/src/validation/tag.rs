//! Tag normalization and validation

use std::sync::OnceLock;

use regex::Regex;

use super::common::{char_len, fold};
use super::{Field, ValidationErrors};
use crate::domain::Tag;

pub const TAG_MAX: usize = 32;

pub const TAG_EMPTY: &str = "Tag cannot be empty";
pub const TAG_TOO_LONG: &str = "Tag must be 32 characters or less";
pub const TAG_INVALID: &str = "Tag must only include letters, numbers, spaces or hyphens";
pub const TAG_DUPLICATE: &str = "Tag already exists on this renovation record";
pub const TAG_LIMIT: &str = "Cannot add tag: five tags already exist on this renovation record";
pub const TAG_PROFANE: &str = "Tag contains inappropriate language";

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}\p{N} \-]+$").expect("tag pattern"))
}

/// Lowercase, strip diacritics, trim and collapse inner whitespace
pub fn normalize_tag(raw: &str) -> String {
    fold(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validate a new tag against the record's existing tags. Returns the
/// normalized name to store.
pub fn validate_tag(raw: &str, existing: &[Tag]) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = normalize_tag(raw);

    if name.is_empty() {
        errors.add(Field::Tag, TAG_EMPTY);
    } else if char_len(&name) > TAG_MAX {
        errors.add(Field::Tag, TAG_TOO_LONG);
    } else if !tag_re().is_match(&name) {
        errors.add(Field::Tag, TAG_INVALID);
    } else if existing.iter().any(|t| t.name == name) {
        errors.add(Field::Tag, TAG_DUPLICATE);
    } else if existing.len() >= Tag::MAX_PER_RECORD {
        errors.add(Field::Tag, TAG_LIMIT);
    }

    errors.into_result(name)
}
