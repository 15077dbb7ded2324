//! Repository port - persistence abstraction

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{
    Expense, Job, Quote, Rating, RenovationRecord, ResetPasswordToken, Room, Tag, User,
};

/// Row counts for the status summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub users: i64,
    pub records: i64,
    pub jobs: i64,
    pub posted_jobs: i64,
    pub quotes: i64,
    pub expenses: i64,
}

/// Persistence abstraction
///
/// Every entity is reached through find-by-id / save / delete and a handful
/// of list queries. Saves are upserts; deletes of missing rows succeed.
/// Implementations (adapters) provide the actual database access logic.
pub trait Repository: Send + Sync {
    // === Users ===

    fn save_user(&self, user: &User) -> Result<()>;

    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Lookup by normalized (lowercase) email
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Delete a user and everything they own
    fn delete_user(&self, id: Uuid) -> Result<()>;

    /// Unverified users registered before `cutoff`
    fn list_unverified_users_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>>;

    // === Password reset tokens ===

    fn save_reset_token(&self, token: &ResetPasswordToken) -> Result<()>;

    fn get_reset_token(&self, token: Uuid) -> Result<Option<ResetPasswordToken>>;

    /// Returns whether a token was removed
    fn delete_reset_token(&self, token: Uuid) -> Result<bool>;

    /// Remove tokens whose expiry is at or before `now`; returns the count
    fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<usize>;

    // === Renovation records ===

    fn save_record(&self, record: &RenovationRecord) -> Result<()>;

    fn get_record(&self, id: Uuid) -> Result<Option<RenovationRecord>>;

    /// Newest first
    fn list_records_by_owner(&self, owner_id: Uuid) -> Result<Vec<RenovationRecord>>;

    /// Newest first
    fn list_public_records(&self) -> Result<Vec<RenovationRecord>>;

    /// Delete a record with its rooms, tags, jobs and their dependents
    fn delete_record(&self, id: Uuid) -> Result<()>;

    // === Rooms ===

    fn save_room(&self, room: &Room) -> Result<()>;

    fn get_room(&self, id: Uuid) -> Result<Option<Room>>;

    fn list_rooms(&self, record_id: Uuid) -> Result<Vec<Room>>;

    fn delete_room(&self, id: Uuid) -> Result<()>;

    // === Tags ===

    fn save_tag(&self, tag: &Tag) -> Result<()>;

    fn list_tags(&self, record_id: Uuid) -> Result<Vec<Tag>>;

    /// Returns whether a tag was removed
    fn delete_tag(&self, record_id: Uuid, name: &str) -> Result<bool>;

    // === Jobs ===

    /// Upsert the job and replace its room links
    fn save_job(&self, job: &Job) -> Result<()>;

    fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// Newest first
    fn list_jobs_by_record(&self, record_id: Uuid) -> Result<Vec<Job>>;

    /// Posted jobs, newest first
    fn list_posted_jobs(&self) -> Result<Vec<Job>>;

    /// Completed jobs on which the tradie's quote was accepted
    fn list_completed_jobs_for_tradie(&self, tradie_id: Uuid) -> Result<Vec<Job>>;

    /// Delete a job with its quotes, expenses, ratings and portfolio links
    fn delete_job(&self, id: Uuid) -> Result<()>;

    // === Quotes ===

    fn save_quote(&self, quote: &Quote) -> Result<()>;

    /// Write every quote decided by an acceptance together with the job,
    /// all or nothing
    fn save_acceptance(&self, job: &Job, quotes: &[Quote]) -> Result<()>;

    fn get_quote(&self, id: Uuid) -> Result<Option<Quote>>;

    fn list_quotes_by_job(&self, job_id: Uuid) -> Result<Vec<Quote>>;

    /// Quotes sent by a tradie, newest first
    fn list_quotes_by_tradie(&self, tradie_id: Uuid) -> Result<Vec<Quote>>;

    /// Quotes on jobs in records owned by `owner_id`, newest first
    fn list_quotes_for_owner(&self, owner_id: Uuid) -> Result<Vec<Quote>>;

    fn delete_quote(&self, id: Uuid) -> Result<()>;

    // === Expenses ===

    fn save_expense(&self, expense: &Expense) -> Result<()>;

    fn get_expense(&self, id: Uuid) -> Result<Option<Expense>>;

    /// Most recent date first
    fn list_expenses_by_job(&self, job_id: Uuid) -> Result<Vec<Expense>>;

    /// Every expense on every job of the record, most recent date first
    fn list_expenses_by_record(&self, record_id: Uuid) -> Result<Vec<Expense>>;

    fn delete_expense(&self, id: Uuid) -> Result<()>;

    // === Ratings ===

    fn save_rating(&self, rating: &Rating) -> Result<()>;

    fn get_rating(&self, rater_id: Uuid, job_id: Uuid) -> Result<Option<Rating>>;

    /// Ratings received by a user
    fn list_ratings_for(&self, rated_id: Uuid) -> Result<Vec<Rating>>;

    // === Portfolio ===

    fn add_portfolio_job(&self, user_id: Uuid, job_id: Uuid) -> Result<()>;

    fn remove_portfolio_job(&self, user_id: Uuid, job_id: Uuid) -> Result<()>;

    fn list_portfolio_jobs(&self, user_id: Uuid) -> Result<Vec<Job>>;

    // === Maintenance ===

    fn counts(&self) -> Result<EntityCounts>;
}
