//! Job domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Blocked,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::NotStarted,
        JobStatus::InProgress,
        JobStatus::Blocked,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "Not Started",
            JobStatus::InProgress => "In Progress",
            JobStatus::Blocked => "Blocked",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether the job can still be advertised for quotes
    pub fn is_open(&self) -> bool {
        !matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    /// Accepts the display form case-insensitively, with spaces, hyphens or
    /// underscores between words ("in progress", "IN_PROGRESS", "in-progress")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "notstarted" => Ok(JobStatus::NotStarted),
            "inprogress" => Ok(JobStatus::InProgress),
            "blocked" => Ok(JobStatus::Blocked),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" | "canceled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Unknown job status: {}", s.trim())),
        }
    }
}

/// Trade category of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    Carpentry,
    Electrical,
    Plumbing,
    Painting,
    Landscaping,
    Roofing,
    Tiling,
    Flooring,
    Demolition,
    Other,
}

impl JobType {
    pub const ALL: [JobType; 10] = [
        JobType::Carpentry,
        JobType::Electrical,
        JobType::Plumbing,
        JobType::Painting,
        JobType::Landscaping,
        JobType::Roofing,
        JobType::Tiling,
        JobType::Flooring,
        JobType::Demolition,
        JobType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Carpentry => "Carpentry",
            JobType::Electrical => "Electrical",
            JobType::Plumbing => "Plumbing",
            JobType::Painting => "Painting",
            JobType::Landscaping => "Landscaping",
            JobType::Roofing => "Roofing",
            JobType::Tiling => "Tiling",
            JobType::Flooring => "Flooring",
            JobType::Demolition => "Demolition",
            JobType::Other => "Other",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        JobType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Unknown job type: {}", trimmed))
    }
}

/// A unit of renovation work within a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub record_id: Uuid,
    pub name: String,
    pub description: String,
    pub job_type: Option<JobType>,
    pub status: JobStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Visible on the public job listings
    pub is_posted: bool,
    pub room_ids: Vec<Uuid>,
    pub image: Option<String>,
    /// Set when the status moves to Completed
    pub completed_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(record_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            name: name.into(),
            description: description.into(),
            job_type: None,
            status: JobStatus::NotStarted,
            start_date: None,
            due_date: None,
            is_posted: false,
            room_ids: Vec::new(),
            image: None,
            completed_on: None,
            created_at: Utc::now(),
        }
    }

    /// Apply a status change, maintaining the completion date
    pub fn set_status(&mut self, status: JobStatus, today: NaiveDate) {
        if status == JobStatus::Completed {
            if self.status != JobStatus::Completed {
                self.completed_on = Some(today);
            }
        } else {
            self.completed_on = None;
        }
        self.status = status;
    }
}
