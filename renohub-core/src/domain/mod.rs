//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with small invariant helpers - no I/O or external dependencies.

mod expense;
mod job;
mod quote;
mod rating;
mod record;
mod user;
pub mod result;

pub use expense::{Expense, ExpenseCategory};
pub use job::{Job, JobStatus, JobType};
pub use quote::{Quote, QuoteStatus};
pub use rating::{Rating, ResetPasswordToken};
pub use record::{Location, RenovationRecord, Room, Tag};
pub use user::User;
