//! Status service - marketplace summary

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::ports::Repository;

/// Status service for the marketplace summary
pub struct StatusService {
    repository: Arc<dyn Repository>,
    integrations: Vec<IntegrationSummary>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn Repository>, integrations: Vec<IntegrationSummary>) -> Self {
        Self {
            repository,
            integrations,
        }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let counts = self.repository.counts()?;

        Ok(StatusSummary {
            total_users: counts.users,
            total_records: counts.records,
            total_jobs: counts.jobs,
            posted_jobs: counts.posted_jobs,
            total_quotes: counts.quotes,
            total_expenses: counts.expenses,
            integrations: self.integrations.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_records: i64,
    pub total_jobs: i64,
    pub posted_jobs: i64,
    pub total_quotes: i64,
    pub total_expenses: i64,
    pub integrations: Vec<IntegrationSummary>,
}

/// Which adapter serves an external concern
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSummary {
    /// "moderation", "geocoding", "mail"
    pub concern: String,
    pub adapter: String,
}

impl IntegrationSummary {
    pub fn new(concern: impl Into<String>, adapter: impl Into<String>) -> Self {
        Self {
            concern: concern.into(),
            adapter: adapter.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::{Job, Location, RenovationRecord, User};

    #[test]
    fn test_status_counts() {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let user = User::new("Ana", None, "ana@example.com", "hash");
        repo.save_user(&user).unwrap();
        let record = RenovationRecord::new(user.id, "House", "House", Location::default());
        repo.save_record(&record).unwrap();
        let mut job = Job::new(record.id, "Deck", "Deck");
        job.is_posted = true;
        repo.save_job(&job).unwrap();
        repo.save_job(&Job::new(record.id, "Roof", "Roof")).unwrap();

        let service = StatusService::new(
            repo,
            vec![IntegrationSummary::new("moderation", "pass-through")],
        );
        let status = service.get_status().unwrap();

        assert_eq!(status.total_users, 1);
        assert_eq!(status.total_records, 1);
        assert_eq!(status.total_jobs, 2);
        assert_eq!(status.posted_jobs, 1);
        assert_eq!(status.total_quotes, 0);
        assert_eq!(status.integrations[0].adapter, "pass-through");
    }
}
