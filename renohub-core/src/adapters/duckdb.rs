//! DuckDB repository implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Row, Transaction};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Expense, ExpenseCategory, Job, JobStatus, JobType, Location, Quote, QuoteStatus, Rating,
    RenovationRecord, ResetPasswordToken, Room, Tag, User,
};
use crate::ports::{EntityCounts, Repository};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

const USER_COLUMNS: &str = "user_id, first_name, last_name, email, password_hash, verified,
     verification_code, city, suburb, profile_image, created_at::VARCHAR";

const RECORD_COLUMNS: &str = "r.record_id, r.owner_id, r.name, r.description, r.street_address,
     r.suburb, r.city, r.postcode, r.country, r.is_public, r.created_at::VARCHAR";

const JOB_COLUMNS: &str = "j.job_id, j.record_id, j.name, j.description, j.job_type, j.status,
     j.start_date::VARCHAR, j.due_date::VARCHAR, j.is_posted, j.image,
     j.completed_on::VARCHAR, j.created_at::VARCHAR,
     (SELECT string_agg(jr.room_id, ',' ORDER BY jr.room_id)
      FROM job_rooms jr WHERE jr.job_id = j.job_id) AS room_ids";

const QUOTE_COLUMNS: &str = "q.quote_id, q.job_id, q.tradie_id, q.price::VARCHAR, q.estimated_days,
     q.description, q.email, q.phone, q.status, q.created_at::VARCHAR";

const EXPENSE_COLUMNS: &str =
    "e.expense_id, e.job_id, e.name, e.cost::VARCHAR, e.category, e.expense_date::VARCHAR";

const RATING_COLUMNS: &str = "rating_id, rater_id, rated_id, job_id, value, created_at::VARCHAR";

/// Jobs selected by a filter on the `jobs` table, for cascading deletes
const JOBS_OF_RECORD: &str = "SELECT job_id FROM jobs WHERE record_id = ?";
const JOBS_OF_OWNER: &str = "SELECT j.job_id FROM jobs j
     JOIN renovation_records r ON r.record_id = j.record_id WHERE r.owner_id = ?";

type SharedConnection = Arc<Mutex<Connection>>;

/// Databases open in this process, keyed by file path
///
/// Writes made through one DuckDB instance are not seen by a second instance
/// of the same file, so every repository on a path shares one connection.
fn open_databases() -> &'static Mutex<HashMap<PathBuf, Weak<Mutex<Connection>>>> {
    static OPEN: OnceLock<Mutex<HashMap<PathBuf, Weak<Mutex<Connection>>>>> = OnceLock::new();
    OPEN.get_or_init(|| Mutex::new(HashMap::new()))
}

fn registry_key(db_path: &Path) -> PathBuf {
    std::path::absolute(db_path).unwrap_or_else(|_| db_path.to_path_buf())
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: SharedConnection,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when the CLI and a long-running process share the file.
    /// A path already open in this process reuses that connection.
    pub fn new(db_path: &Path) -> Result<Self> {
        let key = registry_key(db_path);
        let mut open = open_databases()
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))?;
        open.retain(|_, db| db.strong_count() > 0);
        if let Some(conn) = open.get(&key).and_then(Weak::upgrade) {
            return Ok(Self {
                conn,
                db_path: db_path.to_path_buf(),
            });
        }

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    let conn = Arc::new(Mutex::new(conn));
                    open.insert(key, Arc::downgrade(&conn));
                    return Ok(Self {
                        conn,
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[renohub] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!(
                "Failed to open database after {} retries",
                MAX_RETRIES
            ))
        }))
    }

    /// In-memory database with the schema applied
    pub fn in_memory() -> Result<Self> {
        let repo = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: PathBuf::from(":memory:"),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading is disabled; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Size of the database file in bytes
    pub fn get_db_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.db_path)?.len())
    }

    fn query_records(&self, sql: &str, param: Option<String>) -> Result<Vec<RenovationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match param {
            Some(p) => stmt.query_map([p], row_to_record)?,
            None => stmt.query_map([], row_to_record)?,
        };
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    fn query_jobs(&self, sql: &str, param: Option<String>) -> Result<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match param {
            Some(p) => stmt.query_map([p], row_to_job)?,
            None => stmt.query_map([], row_to_job)?,
        };
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    fn query_quotes(&self, sql: &str, param: String) -> Result<Vec<Quote>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([param], row_to_quote)?;
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    fn query_expenses(&self, sql: &str, param: String) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([param], row_to_expense)?;
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }
}

impl Repository for DuckDbRepository {
    // === Users ===

    fn save_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO users (user_id, first_name, last_name, email, password_hash,
                                           verified, verification_code, city, suburb,
                                           profile_image, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?::TIMESTAMP)",
            params![
                user.id.to_string(),
                user.first_name,
                user.last_name,
                user.email,
                user.password_hash,
                user.verified,
                user.verification_code,
                user.city,
                user.suburb,
                user.profile_image,
                format_timestamp(&user.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE user_id = ?",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map([id.to_string()], row_to_user)?;
        Ok(rows.next().transpose()?)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower(?)",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map([email.trim()], row_to_user)?;
        Ok(rows.next().transpose()?)
    }

    /// Removes the user's records (cascading), quotes, ratings, portfolio
    /// entries and reset tokens
    fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = id.to_string();

        delete_jobs_in(&tx, JOBS_OF_OWNER, &id)?;
        tx.execute(
            "DELETE FROM rooms WHERE record_id IN
                (SELECT record_id FROM renovation_records WHERE owner_id = ?)",
            [&id],
        )?;
        tx.execute(
            "DELETE FROM tags WHERE record_id IN
                (SELECT record_id FROM renovation_records WHERE owner_id = ?)",
            [&id],
        )?;
        tx.execute("DELETE FROM renovation_records WHERE owner_id = ?", [&id])?;
        tx.execute("DELETE FROM quotes WHERE tradie_id = ?", [&id])?;
        tx.execute(
            "DELETE FROM ratings WHERE rater_id = ? OR rated_id = ?",
            [&id, &id],
        )?;
        tx.execute("DELETE FROM portfolio_jobs WHERE user_id = ?", [&id])?;
        tx.execute("DELETE FROM reset_password_tokens WHERE user_id = ?", [&id])?;
        tx.execute("DELETE FROM users WHERE user_id = ?", [&id])?;

        tx.commit()?;
        Ok(())
    }

    fn list_unverified_users_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users
             WHERE NOT verified AND created_at < ?::TIMESTAMP
             ORDER BY created_at",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map([format_timestamp(&cutoff)], row_to_user)?;
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    // === Password reset tokens ===

    fn save_reset_token(&self, token: &ResetPasswordToken) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO reset_password_tokens (token, user_id, expires_at)
             VALUES (?, ?, ?::TIMESTAMP)",
            params![
                token.token.to_string(),
                token.user_id.to_string(),
                format_timestamp(&token.expires_at),
            ],
        )?;
        Ok(())
    }

    fn get_reset_token(&self, token: Uuid) -> Result<Option<ResetPasswordToken>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT token, user_id, expires_at::VARCHAR
             FROM reset_password_tokens WHERE token = ?",
        )?;
        let mut rows = stmt.query_map([token.to_string()], |row| {
            Ok(ResetPasswordToken {
                token: uuid_at(row, 0)?,
                user_id: uuid_at(row, 1)?,
                expires_at: parse_timestamp(&row.get::<_, String>(2)?),
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    fn delete_reset_token(&self, token: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM reset_password_tokens WHERE token = ?",
            [token.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM reset_password_tokens WHERE expires_at <= ?::TIMESTAMP",
            [format_timestamp(&now)],
        )?;
        Ok(deleted)
    }

    // === Renovation records ===

    fn save_record(&self, record: &RenovationRecord) -> Result<()> {
        let conn = self.conn()?;
        let location = &record.location;
        conn.execute(
            "INSERT OR REPLACE INTO renovation_records (record_id, owner_id, name, description,
                                                        street_address, suburb, city, postcode,
                                                        country, is_public, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?::TIMESTAMP)",
            params![
                record.id.to_string(),
                record.owner_id.to_string(),
                record.name,
                record.description,
                location.street_address,
                location.suburb,
                location.city,
                location.postcode,
                location.country,
                record.is_public,
                format_timestamp(&record.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_record(&self, id: Uuid) -> Result<Option<RenovationRecord>> {
        let sql = format!(
            "SELECT {} FROM renovation_records r WHERE r.record_id = ?",
            RECORD_COLUMNS
        );
        Ok(self
            .query_records(&sql, Some(id.to_string()))?
            .into_iter()
            .next())
    }

    fn list_records_by_owner(&self, owner_id: Uuid) -> Result<Vec<RenovationRecord>> {
        let sql = format!(
            "SELECT {} FROM renovation_records r WHERE r.owner_id = ?
             ORDER BY r.created_at DESC",
            RECORD_COLUMNS
        );
        self.query_records(&sql, Some(owner_id.to_string()))
    }

    fn list_public_records(&self) -> Result<Vec<RenovationRecord>> {
        let sql = format!(
            "SELECT {} FROM renovation_records r WHERE r.is_public
             ORDER BY r.created_at DESC",
            RECORD_COLUMNS
        );
        self.query_records(&sql, None)
    }

    fn delete_record(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = id.to_string();

        delete_jobs_in(&tx, JOBS_OF_RECORD, &id)?;
        tx.execute("DELETE FROM rooms WHERE record_id = ?", [&id])?;
        tx.execute("DELETE FROM tags WHERE record_id = ?", [&id])?;
        tx.execute("DELETE FROM renovation_records WHERE record_id = ?", [&id])?;

        tx.commit()?;
        Ok(())
    }

    // === Rooms ===

    fn save_room(&self, room: &Room) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO rooms (room_id, record_id, name, image) VALUES (?, ?, ?, ?)",
            params![
                room.id.to_string(),
                room.record_id.to_string(),
                room.name,
                room.image,
            ],
        )?;
        Ok(())
    }

    fn get_room(&self, id: Uuid) -> Result<Option<Room>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT room_id, record_id, name, image FROM rooms WHERE room_id = ?")?;
        let mut rows = stmt.query_map([id.to_string()], row_to_room)?;
        Ok(rows.next().transpose()?)
    }

    fn list_rooms(&self, record_id: Uuid) -> Result<Vec<Room>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT room_id, record_id, name, image FROM rooms WHERE record_id = ? ORDER BY name",
        )?;
        let rows = stmt.query_map([record_id.to_string()], row_to_room)?;
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    fn delete_room(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM job_rooms WHERE room_id = ?", [id.to_string()])?;
        tx.execute("DELETE FROM rooms WHERE room_id = ?", [id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    // === Tags ===

    fn save_tag(&self, tag: &Tag) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO tags (tag_id, record_id, name) VALUES (?, ?, ?)",
            params![tag.id.to_string(), tag.record_id.to_string(), tag.name],
        )?;
        Ok(())
    }

    fn list_tags(&self, record_id: Uuid) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT tag_id, record_id, name FROM tags WHERE record_id = ? ORDER BY name")?;
        let rows = stmt.query_map([record_id.to_string()], |row| {
            Ok(Tag {
                id: uuid_at(row, 0)?,
                record_id: uuid_at(row, 1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    fn delete_tag(&self, record_id: Uuid, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM tags WHERE record_id = ? AND name = ?",
            params![record_id.to_string(), name],
        )?;
        Ok(deleted > 0)
    }

    // === Jobs ===

    fn save_job(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_job(&tx, job)?;
        tx.commit()?;
        Ok(())
    }

    fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs j WHERE j.job_id = ?", JOB_COLUMNS);
        Ok(self.query_jobs(&sql, Some(id.to_string()))?.into_iter().next())
    }

    fn list_jobs_by_record(&self, record_id: Uuid) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs j WHERE j.record_id = ? ORDER BY j.created_at DESC",
            JOB_COLUMNS
        );
        self.query_jobs(&sql, Some(record_id.to_string()))
    }

    fn list_posted_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs j WHERE j.is_posted ORDER BY j.created_at DESC",
            JOB_COLUMNS
        );
        self.query_jobs(&sql, None)
    }

    fn list_completed_jobs_for_tradie(&self, tradie_id: Uuid) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs j
             WHERE j.status = 'Completed'
               AND EXISTS (SELECT 1 FROM quotes q
                           WHERE q.job_id = j.job_id
                             AND q.tradie_id = ?
                             AND q.status = 'Accepted')
             ORDER BY j.completed_on DESC",
            JOB_COLUMNS
        );
        self.query_jobs(&sql, Some(tradie_id.to_string()))
    }

    fn delete_job(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        delete_jobs_in(&tx, "SELECT CAST(? AS VARCHAR)", &id.to_string())?;
        tx.commit()?;
        Ok(())
    }

    // === Quotes ===

    fn save_quote(&self, quote: &Quote) -> Result<()> {
        let conn = self.conn()?;
        write_quote(&conn, quote)
    }

    fn save_acceptance(&self, job: &Job, quotes: &[Quote]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for quote in quotes {
            write_quote(&tx, quote)?;
        }
        write_job(&tx, job)?;
        tx.commit()?;
        Ok(())
    }

    fn get_quote(&self, id: Uuid) -> Result<Option<Quote>> {
        let sql = format!("SELECT {} FROM quotes q WHERE q.quote_id = ?", QUOTE_COLUMNS);
        Ok(self.query_quotes(&sql, id.to_string())?.into_iter().next())
    }

    fn list_quotes_by_job(&self, job_id: Uuid) -> Result<Vec<Quote>> {
        let sql = format!(
            "SELECT {} FROM quotes q WHERE q.job_id = ? ORDER BY q.created_at DESC",
            QUOTE_COLUMNS
        );
        self.query_quotes(&sql, job_id.to_string())
    }

    fn list_quotes_by_tradie(&self, tradie_id: Uuid) -> Result<Vec<Quote>> {
        let sql = format!(
            "SELECT {} FROM quotes q WHERE q.tradie_id = ? ORDER BY q.created_at DESC",
            QUOTE_COLUMNS
        );
        self.query_quotes(&sql, tradie_id.to_string())
    }

    fn list_quotes_for_owner(&self, owner_id: Uuid) -> Result<Vec<Quote>> {
        let sql = format!(
            "SELECT {} FROM quotes q
             JOIN jobs j ON j.job_id = q.job_id
             JOIN renovation_records r ON r.record_id = j.record_id
             WHERE r.owner_id = ?
             ORDER BY q.created_at DESC",
            QUOTE_COLUMNS
        );
        self.query_quotes(&sql, owner_id.to_string())
    }

    fn delete_quote(&self, id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM quotes WHERE quote_id = ?", [id.to_string()])?;
        Ok(())
    }

    // === Expenses ===

    fn save_expense(&self, expense: &Expense) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO expenses (expense_id, job_id, name, cost, category, expense_date)
             VALUES (?, ?, ?, ?::DECIMAL(12, 2), ?, ?::DATE)",
            params![
                expense.id.to_string(),
                expense.job_id.to_string(),
                expense.name,
                expense.cost.to_string(),
                expense.category.as_str(),
                format_date(expense.date),
            ],
        )?;
        Ok(())
    }

    fn get_expense(&self, id: Uuid) -> Result<Option<Expense>> {
        let sql = format!(
            "SELECT {} FROM expenses e WHERE e.expense_id = ?",
            EXPENSE_COLUMNS
        );
        Ok(self.query_expenses(&sql, id.to_string())?.into_iter().next())
    }

    fn list_expenses_by_job(&self, job_id: Uuid) -> Result<Vec<Expense>> {
        let sql = format!(
            "SELECT {} FROM expenses e WHERE e.job_id = ?
             ORDER BY e.expense_date DESC, e.name",
            EXPENSE_COLUMNS
        );
        self.query_expenses(&sql, job_id.to_string())
    }

    fn list_expenses_by_record(&self, record_id: Uuid) -> Result<Vec<Expense>> {
        let sql = format!(
            "SELECT {} FROM expenses e
             JOIN jobs j ON j.job_id = e.job_id
             WHERE j.record_id = ?
             ORDER BY e.expense_date DESC, e.name",
            EXPENSE_COLUMNS
        );
        self.query_expenses(&sql, record_id.to_string())
    }

    fn delete_expense(&self, id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM expenses WHERE expense_id = ?", [id.to_string()])?;
        Ok(())
    }

    // === Ratings ===

    fn save_rating(&self, rating: &Rating) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO ratings (rating_id, rater_id, rated_id, job_id, value, created_at)
             VALUES (?, ?, ?, ?, ?, ?::TIMESTAMP)",
            params![
                rating.id.to_string(),
                rating.rater_id.to_string(),
                rating.rated_id.to_string(),
                rating.job_id.to_string(),
                rating.value as i64,
                format_timestamp(&rating.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_rating(&self, rater_id: Uuid, job_id: Uuid) -> Result<Option<Rating>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ratings WHERE rater_id = ? AND job_id = ?",
            RATING_COLUMNS
        ))?;
        let mut rows = stmt.query_map(
            params![rater_id.to_string(), job_id.to_string()],
            row_to_rating,
        )?;
        Ok(rows.next().transpose()?)
    }

    fn list_ratings_for(&self, rated_id: Uuid) -> Result<Vec<Rating>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ratings WHERE rated_id = ? ORDER BY created_at DESC",
            RATING_COLUMNS
        ))?;
        let rows = stmt.query_map([rated_id.to_string()], row_to_rating)?;
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    // === Portfolio ===

    fn add_portfolio_job(&self, user_id: Uuid, job_id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO portfolio_jobs (user_id, job_id) VALUES (?, ?)",
            params![user_id.to_string(), job_id.to_string()],
        )?;
        Ok(())
    }

    fn remove_portfolio_job(&self, user_id: Uuid, job_id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM portfolio_jobs WHERE user_id = ? AND job_id = ?",
            params![user_id.to_string(), job_id.to_string()],
        )?;
        Ok(())
    }

    fn list_portfolio_jobs(&self, user_id: Uuid) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs j
             JOIN portfolio_jobs p ON p.job_id = j.job_id
             WHERE p.user_id = ?
             ORDER BY p.added_at DESC",
            JOB_COLUMNS
        );
        self.query_jobs(&sql, Some(user_id.to_string()))
    }

    // === Maintenance ===

    fn counts(&self) -> Result<EntityCounts> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM renovation_records),
                    (SELECT COUNT(*) FROM jobs),
                    (SELECT COUNT(*) FROM jobs WHERE is_posted),
                    (SELECT COUNT(*) FROM quotes),
                    (SELECT COUNT(*) FROM expenses)",
            [],
            |row| {
                Ok(EntityCounts {
                    users: row.get(0)?,
                    records: row.get(1)?,
                    jobs: row.get(2)?,
                    posted_jobs: row.get(3)?,
                    quotes: row.get(4)?,
                    expenses: row.get(5)?,
                })
            },
        )?;
        Ok(counts)
    }
}

fn write_job(conn: &Connection, job: &Job) -> Result<()> {
    let id = job.id.to_string();

    conn.execute(
        "INSERT OR REPLACE INTO jobs (job_id, record_id, name, description, job_type, status,
                                      start_date, due_date, is_posted, image, completed_on,
                                      created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?::DATE, ?::DATE, ?, ?, ?::DATE, ?::TIMESTAMP)",
        params![
            id,
            job.record_id.to_string(),
            job.name,
            job.description,
            job.job_type.map(|t| t.as_str()),
            job.status.as_str(),
            job.start_date.map(format_date),
            job.due_date.map(format_date),
            job.is_posted,
            job.image,
            job.completed_on.map(format_date),
            format_timestamp(&job.created_at),
        ],
    )?;

    let mut room_ids = job.room_ids.clone();
    room_ids.sort();
    room_ids.dedup();
    conn.execute("DELETE FROM job_rooms WHERE job_id = ?", [&id])?;
    for room_id in room_ids {
        conn.execute(
            "INSERT INTO job_rooms (job_id, room_id) VALUES (?, ?)",
            params![id, room_id.to_string()],
        )?;
    }
    Ok(())
}

fn write_quote(conn: &Connection, quote: &Quote) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO quotes (quote_id, job_id, tradie_id, price, estimated_days,
                                        description, email, phone, status, created_at)
         VALUES (?, ?, ?, ?::DECIMAL(12, 2), ?, ?, ?, ?, ?, ?::TIMESTAMP)",
        params![
            quote.id.to_string(),
            quote.job_id.to_string(),
            quote.tradie_id.to_string(),
            quote.price.to_string(),
            quote.estimated_days as i64,
            quote.description,
            quote.email,
            quote.phone,
            quote.status.as_str(),
            format_timestamp(&quote.created_at),
        ],
    )?;
    Ok(())
}

/// Delete the jobs selected by `job_ids_sql` together with everything that
/// hangs off them. `job_ids_sql` takes a single `?` parameter.
fn delete_jobs_in(tx: &Transaction<'_>, job_ids_sql: &str, param: &str) -> Result<()> {
    for table in ["quotes", "expenses", "ratings", "portfolio_jobs", "job_rooms", "jobs"] {
        tx.execute(
            &format!("DELETE FROM {} WHERE job_id IN ({})", table, job_ids_sql),
            [param],
        )?;
    }
    Ok(())
}

// Row mapping

fn row_to_user(row: &Row) -> duckdb::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        verified: row.get(5)?,
        verification_code: row.get(6)?,
        city: row.get(7)?,
        suburb: row.get(8)?,
        profile_image: row.get(9)?,
        created_at: parse_timestamp(&row.get::<_, String>(10)?),
    })
}

fn row_to_record(row: &Row) -> duckdb::Result<RenovationRecord> {
    Ok(RenovationRecord {
        id: uuid_at(row, 0)?,
        owner_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        location: Location {
            street_address: row.get(4)?,
            suburb: row.get(5)?,
            city: row.get(6)?,
            postcode: row.get(7)?,
            country: row.get(8)?,
        },
        is_public: row.get(9)?,
        created_at: parse_timestamp(&row.get::<_, String>(10)?),
    })
}

fn row_to_room(row: &Row) -> duckdb::Result<Room> {
    Ok(Room {
        id: uuid_at(row, 0)?,
        record_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        image: row.get(3)?,
    })
}

fn row_to_job(row: &Row) -> duckdb::Result<Job> {
    // Column indices from JOB_COLUMNS:
    // 0: job_id, 1: record_id, 2: name, 3: description, 4: job_type, 5: status,
    // 6: start_date, 7: due_date, 8: is_posted, 9: image, 10: completed_on,
    // 11: created_at, 12: room_ids (comma separated)
    let job_type: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let room_ids: Option<String> = row.get(12)?;

    Ok(Job {
        id: uuid_at(row, 0)?,
        record_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        job_type: job_type.and_then(|t| JobType::from_str(&t).ok()),
        status: JobStatus::from_str(&status).unwrap_or(JobStatus::NotStarted),
        start_date: row.get::<_, Option<String>>(6)?.map(|s| parse_date(&s)),
        due_date: row.get::<_, Option<String>>(7)?.map(|s| parse_date(&s)),
        is_posted: row.get(8)?,
        image: row.get(9)?,
        completed_on: row.get::<_, Option<String>>(10)?.map(|s| parse_date(&s)),
        created_at: parse_timestamp(&row.get::<_, String>(11)?),
        room_ids: room_ids
            .map(|ids| {
                ids.split(',')
                    .filter_map(|id| Uuid::parse_str(id.trim()).ok())
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn row_to_quote(row: &Row) -> duckdb::Result<Quote> {
    let status: String = row.get(8)?;
    let days: i64 = row.get(4)?;
    Ok(Quote {
        id: uuid_at(row, 0)?,
        job_id: uuid_at(row, 1)?,
        tradie_id: uuid_at(row, 2)?,
        price: decimal_at(row, 3)?,
        estimated_days: days.max(0) as u32,
        description: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        status: QuoteStatus::from_str(&status).unwrap_or(QuoteStatus::Pending),
        created_at: parse_timestamp(&row.get::<_, String>(9)?),
    })
}

fn row_to_expense(row: &Row) -> duckdb::Result<Expense> {
    let category: String = row.get(4)?;
    Ok(Expense {
        id: uuid_at(row, 0)?,
        job_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        cost: decimal_at(row, 3)?,
        category: ExpenseCategory::from_str(&category).unwrap_or(ExpenseCategory::Other),
        date: parse_date(&row.get::<_, String>(5)?),
    })
}

fn row_to_rating(row: &Row) -> duckdb::Result<Rating> {
    let value: i64 = row.get(4)?;
    Ok(Rating {
        id: uuid_at(row, 0)?,
        rater_id: uuid_at(row, 1)?,
        rated_id: uuid_at(row, 2)?,
        job_id: uuid_at(row, 3)?,
        value: value.clamp(Rating::MIN as i64, Rating::MAX as i64) as u8,
        created_at: parse_timestamp(&row.get::<_, String>(5)?),
    })
}

// Helper functions

fn uuid_at(row: &Row, idx: usize) -> duckdb::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s)
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn decimal_at(row: &Row, idx: usize) -> duckdb::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(s.trim())
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => Utc.from_utc_datetime(&parse_naive_datetime(s)),
    }
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_naive_datetime(s: &str) -> NaiveDateTime {
    // Try various timestamp formats that DuckDB might produce
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_naive_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 6)
            .unwrap();
        assert_eq!(parse_naive_datetime("2024-03-09 14:05:06"), expected);
        assert_eq!(parse_naive_datetime("2024-03-09T14:05:06"), expected);

        let fractional = parse_naive_datetime("2024-03-09 14:05:06.25");
        assert_eq!(fractional.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_timestamp_accepts_rfc3339() {
        let parsed = parse_timestamp("2024-03-09T14:05:06+13:00");
        assert_eq!(parsed.hour(), 1);
    }

    #[test]
    fn test_format_timestamp_round_trips_through_parser() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now));
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error("IO Error: database is locked"));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_save_quote_then_acceptance() {
        let repo = DuckDbRepository::in_memory().unwrap();
        let job = Job::new(Uuid::new_v4(), "Deck", "Build a deck");
        repo.save_job(&job).unwrap();
        let mut quote = Quote::new(job.id, Uuid::new_v4(), Decimal::new(95000, 2), 5, "Kwila deck");
        repo.save_quote(&quote).unwrap();

        let stored = repo.get_quote(quote.id).unwrap().unwrap();
        assert_eq!(stored.price, Decimal::new(95000, 2));
        assert!(stored.is_pending());

        quote.status = QuoteStatus::Accepted;
        let mut hired = job.clone();
        hired.is_posted = false;
        repo.save_acceptance(&hired, &[quote.clone()]).unwrap();
        assert_eq!(repo.get_quote(quote.id).unwrap().unwrap().status, QuoteStatus::Accepted);
        assert_eq!(repo.list_quotes_by_job(job.id).unwrap().len(), 1);
    }
}
