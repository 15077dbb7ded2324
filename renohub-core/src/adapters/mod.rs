//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Repository port
//! - Perspective HTTP client for ModerationClient
//! - LocationIQ HTTP client for GeocodingClient
//! - File outbox and in-memory recorder for Mailer
//! - Offline stand-ins for disabled services

pub mod duckdb;
pub mod locationiq;
pub mod mail;
pub mod offline;
pub mod perspective;

#[cfg(test)]
pub mod mock_http;
