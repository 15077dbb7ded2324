//! Renovation record, room, tag and location domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Street location of a renovation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub street_address: String,
    pub suburb: Option<String>,
    pub city: String,
    pub postcode: Option<String>,
    pub country: String,
}

impl Location {
    /// Single line form, e.g. "12 Oak Lane, Riccarton, Christchurch 8041, New Zealand"
    pub fn display_line(&self) -> String {
        let mut parts = vec![self.street_address.clone()];
        if let Some(suburb) = &self.suburb {
            parts.push(suburb.clone());
        }
        match &self.postcode {
            Some(postcode) => parts.push(format!("{} {}", self.city, postcode)),
            None => parts.push(self.city.clone()),
        }
        parts.push(self.country.clone());
        parts.join(", ")
    }
}

/// An owner's top-level project container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenovationRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub location: Location,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl RenovationRecord {
    pub fn new(
        owner_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            description: description.into(),
            location,
            is_public: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// A room within a renovation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub record_id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

impl Room {
    pub fn new(record_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            name: name.into(),
            image: None,
        }
    }
}

/// A normalized label on a renovation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub record_id: Uuid,
    pub name: String,
}

impl Tag {
    /// Maximum number of tags on one record
    pub const MAX_PER_RECORD: usize = 5;

    pub fn new(record_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            name: name.into(),
        }
    }
}
