//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "baseUrl": "http://localhost:8080", "pageSizes": { "jobs": 10, ... } },
//!   "moderation": { "enabled": true, "apiKey": "...", "threshold": 0.3 },
//!   "geocoding": { "enabled": true, "apiKey": "...", "minIntervalMs": 1000 },
//!   "mail": { "from": "no-reply@renohub.local" },
//!   "scheduling": { "resetTokenTtlMinutes": 10, "unverifiedUserTtlMinutes": 10 }
//! }
//! ```
//! Keys the core does not know about are preserved when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::services::moderation::DEFAULT_THRESHOLD;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    moderation: ModerationSettings,
    #[serde(default)]
    geocoding: GeocodingSettings,
    #[serde(default)]
    mail: MailSettings,
    #[serde(default)]
    scheduling: SchedulingSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Page size per paginated list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSizes {
    pub records: usize,
    pub jobs: usize,
    pub quotes: usize,
    pub expenses: usize,
    pub listings: usize,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            records: 10,
            jobs: 10,
            quotes: 10,
            expenses: 10,
            listings: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Public address used in links sent by email
    pub base_url: String,
    pub page_sizes: PageSizes,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            page_sizes: PageSizes::default(),
            other: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModerationSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    /// Scores strictly above this are profane
    pub threshold: f64,
    pub min_interval_ms: u64,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: "https://commentanalyzer.googleapis.com/v1alpha1".to_string(),
            threshold: DEFAULT_THRESHOLD,
            min_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeocodingSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub min_interval_ms: u64,
    /// Country code restriction for autocomplete
    pub country_code: String,
}

impl Default for GeocodingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: "https://api.locationiq.com/v1".to_string(),
            min_interval_ms: 1000,
            country_code: "nz".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailSettings {
    pub from: String,
    /// Directory outgoing mail is written to; `{data_dir}/outbox` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbox_dir: Option<PathBuf>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: "no-reply@renohub.local".to_string(),
            outbox_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingSettings {
    pub reset_token_ttl_minutes: u64,
    pub unverified_user_ttl_minutes: u64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            reset_token_ttl_minutes: 10,
            unverified_user_ttl_minutes: 10,
        }
    }
}

impl SchedulingSettings {
    pub fn reset_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reset_token_ttl_minutes as i64)
    }

    pub fn unverified_user_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.unverified_user_ttl_minutes as i64)
    }
}

/// Renohub configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub app: AppSettings,
    pub moderation: ModerationSettings,
    pub geocoding: GeocodingSettings,
    pub mail: MailSettings,
    pub scheduling: SchedulingSettings,
    // Top-level keys we don't manage, kept for saving
    other: HashMap<String, serde_json::Value>,
}

fn env_flag(name: &str) -> Option<bool> {
    match std::env::var(name).ok().as_deref() {
        Some("true" | "1" | "yes" | "TRUE" | "YES") => Some(true),
        Some("false" | "0" | "no" | "FALSE" | "NO") => Some(false),
        _ => None,
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load config from the data directory
    ///
    /// API keys and the moderation switch can be overridden through
    /// `RENOHUB_MODERATION_API_KEY`, `RENOHUB_GEOCODING_API_KEY` and
    /// `RENOHUB_MODERATION_ENABLED`. A malformed settings file falls back to
    /// defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self {
            app: raw.app,
            moderation: raw.moderation,
            geocoding: raw.geocoding,
            mail: raw.mail,
            scheduling: raw.scheduling,
            other: raw.other,
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(key) = env_string("RENOHUB_MODERATION_API_KEY") {
            self.moderation.api_key = Some(key);
        }
        if let Some(key) = env_string("RENOHUB_GEOCODING_API_KEY") {
            self.geocoding.api_key = Some(key);
        }
        if let Some(enabled) = env_flag("RENOHUB_MODERATION_ENABLED") {
            self.moderation.enabled = enabled;
        }
    }

    /// Save config to the data directory
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings = SettingsFile {
            app: self.app.clone(),
            moderation: self.moderation.clone(),
            geocoding: self.geocoding.clone(),
            mail: self.mail.clone(),
            scheduling: self.scheduling.clone(),
            other: self.other.clone(),
        };

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join("settings.json"), content)?;
        Ok(())
    }

    /// Where outgoing mail is written
    pub fn outbox_dir(&self, data_dir: &Path) -> PathBuf {
        self.mail
            .outbox_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("outbox"))
    }
}
