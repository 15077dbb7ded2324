//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account. The same account can own renovation records
/// and act as a tradie submitting quotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Stored lowercased; unique across users
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verified: bool,
    /// Six digit code emailed on registration, cleared once verified
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    pub city: Option<String>,
    pub suburb: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unverified user
    pub fn new(
        first_name: impl Into<String>,
        last_name: Option<String>,
        email: &str,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name,
            email: Self::normalize_email(email),
            password_hash: password_hash.into(),
            verified: false,
            verification_code: None,
            city: None,
            suburb: None,
            profile_image: None,
            created_at: Utc::now(),
        }
    }

    /// Normalize an email for storage and lookup
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// First and last name joined for display
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}
