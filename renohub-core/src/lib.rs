//! Renohub Core - Business logic for the Renohub renovation marketplace
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (User, RenovationRecord, Job, Quote, etc.)
//! - **validation**: Form rules producing typed values or per-field errors
//! - **ports**: Trait definitions for external dependencies (Repository, Mailer, ...)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, Perspective, LocationIQ, etc.)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;
pub mod validation;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use adapters::duckdb::DuckDbRepository;
use adapters::locationiq::LocationIqClient;
use adapters::mail::OutboxMailer;
use adapters::offline::{PassThroughModerator, StaticGeocoder};
use adapters::perspective::PerspectiveClient;
use config::{Config, GeocodingSettings, ModerationSettings};
use ports::{GeocodingClient, Mailer, ModerationClient, Repository};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Expense, ExpenseCategory, Job, JobStatus, JobType, Location, Quote, QuoteStatus, Rating,
    RenovationRecord, Room, Tag, User,
};
pub use validation::{Field, ValidationErrors};

/// Main database file inside the data directory
pub const DB_FILENAME: &str = "renohub.duckdb";

/// External collaborators the context is built around
pub struct Adapters {
    pub mailer: Arc<dyn Mailer>,
    pub moderation: Arc<dyn ModerationClient>,
    pub geocoding: Arc<dyn GeocodingClient>,
    pub hasher: PasswordHasherService,
}

impl Adapters {
    /// Real clients where settings enable them and carry a key, offline
    /// stand-ins otherwise. Mail always goes to the outbox directory.
    pub fn from_config(config: &Config, data_dir: &Path) -> Result<Self> {
        let moderation: Arc<dyn ModerationClient> = match moderation_key(&config.moderation) {
            Some(key) => Arc::new(
                PerspectiveClient::new_with_base_url(key, &config.moderation.base_url)
                    .context("Failed to set up moderation client")?,
            ),
            None => Arc::new(PassThroughModerator),
        };

        let geocoding: Arc<dyn GeocodingClient> = match geocoding_key(&config.geocoding) {
            Some(key) => Arc::new(
                LocationIqClient::new_with_base_url(
                    key,
                    &config.geocoding.country_code,
                    &config.geocoding.base_url,
                )
                .context("Failed to set up geocoding client")?,
            ),
            None => Arc::new(StaticGeocoder),
        };

        let mailer = Arc::new(OutboxMailer::new(
            &config.outbox_dir(data_dir),
            config.mail.from.clone(),
        ));

        Ok(Self {
            mailer,
            moderation,
            geocoding,
            hasher: PasswordHasherService::new(),
        })
    }
}

fn moderation_key(settings: &ModerationSettings) -> Option<&str> {
    settings
        .api_key
        .as_deref()
        .filter(|k| settings.enabled && !k.trim().is_empty())
}

fn geocoding_key(settings: &GeocodingSettings) -> Option<&str> {
    settings
        .api_key
        .as_deref()
        .filter(|k| settings.enabled && !k.trim().is_empty())
}

/// Main context for Renohub operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct RenohubContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub logger: Arc<LoggingService>,
    pub scheduler: Arc<DelayedTaskScheduler>,
    pub status_service: StatusService,
    pub user_service: UserService,
    pub record_service: RecordService,
    pub job_service: JobService,
    pub quote_service: QuoteService,
    pub expense_service: ExpenseService,
    pub rating_service: RatingService,
    pub comparison_service: ComparisonService,
    pub search_service: SearchService,
    pub location_service: LocationService,
    pub moderation_service: Arc<ModerationService>,
    pub notification_service: Arc<NotificationService>,
    /// What the startup sweep removed
    pub purged: PurgeReport,
}

impl RenohubContext {
    /// Create a context with adapters chosen from settings
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;
        let adapters = Adapters::from_config(&config, data_dir)?;
        Self::with_adapters(data_dir, entry_point, config, adapters)
    }

    /// Create a context around explicit adapters
    ///
    /// Expired reset tokens and unverified accounts left over from earlier
    /// runs are purged before returning.
    pub fn with_adapters(
        data_dir: &Path,
        entry_point: EntryPoint,
        config: Config,
        adapters: Adapters,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;
        let repo: Arc<dyn Repository> = repository.clone();

        let logger = Arc::new(LoggingService::new(
            data_dir,
            entry_point,
            env!("CARGO_PKG_VERSION"),
        )?);
        let scheduler = Arc::new(DelayedTaskScheduler::new(Arc::clone(&logger))?);
        let images = Arc::new(ImageStore::new(data_dir));
        let sizes = config.app.page_sizes.clone();

        let mut moderation_settings = config.moderation.clone();
        if adapters.moderation.is_offline() {
            moderation_settings.min_interval_ms = 0;
        }
        let mut geocoding_settings = config.geocoding.clone();
        if adapters.geocoding.is_offline() {
            geocoding_settings.min_interval_ms = 0;
        }

        let integrations = vec![
            IntegrationSummary::new("moderation", adapters.moderation.name()),
            IntegrationSummary::new("geocoding", adapters.geocoding.name()),
        ];

        let moderation_service = Arc::new(ModerationService::new(
            adapters.moderation,
            &moderation_settings,
            Arc::clone(&logger),
        ));
        let location_service =
            LocationService::new(adapters.geocoding, &geocoding_settings, Arc::clone(&logger));
        let notification_service = Arc::new(NotificationService::new(
            adapters.mailer,
            &config.app.base_url,
            Arc::clone(&logger),
        ));

        let user_service = UserService::new(
            Arc::clone(&repo),
            adapters.hasher,
            Arc::clone(&notification_service),
            Arc::clone(&scheduler),
            Arc::clone(&images),
            config.scheduling.clone(),
            Arc::clone(&logger),
        );
        let record_service = RecordService::new(
            Arc::clone(&repo),
            Arc::clone(&moderation_service),
            Arc::clone(&images),
            sizes.records,
        );
        let job_service = JobService::new(
            Arc::clone(&repo),
            Arc::clone(&moderation_service),
            Arc::clone(&images),
            sizes.jobs,
        );
        let quote_service = QuoteService::new(
            Arc::clone(&repo),
            Arc::clone(&moderation_service),
            Arc::clone(&notification_service),
            sizes.quotes,
            Arc::clone(&logger),
        );
        let expense_service = ExpenseService::new(Arc::clone(&repo), sizes.expenses);
        let rating_service = RatingService::new(Arc::clone(&repo));
        let comparison_service = ComparisonService::new(Arc::clone(&repo));
        let search_service = SearchService::new(Arc::clone(&repo), sizes.listings);
        let status_service = StatusService::new(Arc::clone(&repo), integrations);

        let purged = user_service
            .purge_expired(Utc::now())
            .context("Failed to purge expired accounts")?;

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            logger,
            scheduler,
            status_service,
            user_service,
            record_service,
            job_service,
            quote_service,
            expense_service,
            rating_service,
            comparison_service,
            search_service,
            location_service,
            moderation_service,
            notification_service,
            purged,
        })
    }
}
