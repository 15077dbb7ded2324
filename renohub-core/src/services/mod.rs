//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod comparison;
mod expense;
pub mod job;
pub mod location;
pub mod logging;
pub mod migration;
pub mod moderation;
pub mod notification;
pub mod pagination;
pub mod password;
mod quote;
mod rating;
pub mod record;
pub mod scheduler;
mod search;
mod status;
pub mod storage;
pub mod user;

pub use comparison::{ComparisonService, TradieComparison, TradieProfile};
pub use expense::{CategoryTotal, ExpenseService};
pub use job::JobService;
pub use location::LocationService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LogFilter, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use moderation::ModerationService;
pub use notification::NotificationService;
pub use pagination::Page;
pub use password::PasswordHasherService;
pub use quote::QuoteService;
pub use rating::RatingService;
pub use record::{RecordDetails, RecordQuery, RecordService};
pub use scheduler::DelayedTaskScheduler;
pub use search::{Listing, ListingFilter, SearchService};
pub use status::{IntegrationSummary, StatusService, StatusSummary};
pub use storage::{ImageKind, ImageStore};
pub use user::{PurgeReport, UserService};
