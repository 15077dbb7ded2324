//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod geocoding;
mod mailer;
mod moderation;
mod repository;

pub use geocoding::{AddressSuggestion, BoundingBox, GeocodingClient};
pub use mailer::{Email, Mailer};
pub use moderation::ModerationClient;
pub use repository::{EntityCounts, Repository};
