//! Rating service - owners rate the tradie they hired

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{JobStatus, QuoteStatus, Rating};
use crate::ports::Repository;
use crate::services::job::owned_job;
use crate::validation::Field;

pub const RATING_OUT_OF_RANGE: &str = "Rating must be between 1 and 5";

pub struct RatingService {
    repository: Arc<dyn Repository>,
}

impl RatingService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Rate the tradie whose quote was accepted on a completed job
    pub fn rate(&self, owner: Uuid, job_id: Uuid, value: u8) -> Result<Rating> {
        if !(Rating::MIN..=Rating::MAX).contains(&value) {
            return Err(Error::invalid(Field::Rating, RATING_OUT_OF_RANGE));
        }

        let (job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        if job.status != JobStatus::Completed {
            return Err(Error::conflict("Only completed jobs can be rated"));
        }
        let tradie = self
            .repository
            .list_quotes_by_job(job_id)?
            .into_iter()
            .find(|q| q.status == QuoteStatus::Accepted)
            .map(|q| q.tradie_id)
            .ok_or_else(|| Error::conflict("No tradie was hired for this job"))?;
        if self.repository.get_rating(owner, job_id)?.is_some() {
            return Err(Error::conflict("This job has already been rated"));
        }

        let rating = Rating::new(owner, tradie, job_id, value);
        self.repository.save_rating(&rating)?;
        Ok(rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::{Job, Location, Quote, RenovationRecord};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn completed_job_with_hire(repo: &DuckDbRepository, owner: Uuid, tradie: Uuid) -> Job {
        let record = RenovationRecord::new(owner, "House", "Whole house", Location::default());
        repo.save_record(&record).unwrap();
        let mut job = Job::new(record.id, "Fence", "Replace the fence");
        job.set_status(JobStatus::Completed, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        repo.save_job(&job).unwrap();
        let mut quote = Quote::new(job.id, tradie, Decimal::new(800, 0), 2, "Fence");
        quote.status = QuoteStatus::Accepted;
        repo.save_quote(&quote).unwrap();
        job
    }

    #[test]
    fn test_rate_hired_tradie_once() {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let service = RatingService::new(repo.clone());
        let (owner, tradie) = (Uuid::new_v4(), Uuid::new_v4());
        let job = completed_job_with_hire(&repo, owner, tradie);

        let rating = service.rate(owner, job.id, 4).unwrap();
        assert_eq!(rating.rated_id, tradie);
        assert!(matches!(service.rate(owner, job.id, 5), Err(Error::Conflict(_))));

        let second = completed_job_with_hire(&repo, owner, tradie);
        service.rate(owner, second.id, 5).unwrap();
        assert_eq!(repo.list_ratings_for(tradie).unwrap().len(), 2);
    }

    #[test]
    fn test_rating_rules() {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let service = RatingService::new(repo.clone());
        let (owner, tradie) = (Uuid::new_v4(), Uuid::new_v4());
        let job = completed_job_with_hire(&repo, owner, tradie);

        let err = service.rate(owner, job.id, 6).unwrap_err();
        assert!(err.validation_errors().unwrap().contains(Field::Rating, RATING_OUT_OF_RANGE));
        assert!(service.rate(owner, job.id, 0).is_err());
        assert!(matches!(service.rate(Uuid::new_v4(), job.id, 3), Err(Error::Forbidden(_))));

        let record = RenovationRecord::new(owner, "Other", "Other", Location::default());
        repo.save_record(&record).unwrap();
        let open = Job::new(record.id, "Paint", "Paint");
        repo.save_job(&open).unwrap();
        assert!(matches!(service.rate(owner, open.id, 3), Err(Error::Conflict(_))));
    }
}
