//! Job service - jobs within renovation records, posting and portfolios

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Job, JobStatus, QuoteStatus, RenovationRecord};
use crate::ports::Repository;
use crate::services::moderation::ModerationService;
use crate::services::pagination::Page;
use crate::services::record::{owned_record, DESCRIPTION_PROFANE, NAME_PROFANE};
use crate::services::storage::{ImageKind, ImageStore};
use crate::validation::{validate_job, DateRule, Field, JobForm, ParsedJob, ValidationErrors};

pub const ROOM_NOT_IN_RECORD: &str = "Rooms must belong to this renovation record";

/// Calendar date used for date rules and completion stamps
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Load a job and its record, checking the record belongs to `owner`
pub(crate) fn owned_job(
    repository: &dyn Repository,
    owner: Uuid,
    job_id: Uuid,
) -> Result<(Job, RenovationRecord)> {
    let job = repository
        .get_job(job_id)?
        .ok_or_else(|| Error::not_found(format!("Job {}", job_id)))?;
    let record = owned_record(repository, owner, job.record_id)?;
    Ok((job, record))
}

pub struct JobService {
    repository: Arc<dyn Repository>,
    moderation: Arc<ModerationService>,
    images: Arc<ImageStore>,
    page_size: usize,
}

impl JobService {
    pub fn new(
        repository: Arc<dyn Repository>,
        moderation: Arc<ModerationService>,
        images: Arc<ImageStore>,
        page_size: usize,
    ) -> Self {
        Self {
            repository,
            moderation,
            images,
            page_size,
        }
    }

    /// Validation plus moderation and room membership, all reported together
    fn check(
        &self,
        record_id: Uuid,
        form: &JobForm,
        rule: DateRule,
        room_ids: &[Uuid],
    ) -> Result<ParsedJob> {
        let parsed = validate_job(form, rule, today())?;

        let mut errors = ValidationErrors::new();
        self.moderation.flag(&mut errors, Field::Name, &parsed.name, NAME_PROFANE)?;
        self.moderation
            .flag(&mut errors, Field::Description, &parsed.description, DESCRIPTION_PROFANE)?;

        for room_id in room_ids {
            let belongs = self
                .repository
                .get_room(*room_id)?
                .map(|room| room.record_id == record_id)
                .unwrap_or(false);
            if !belongs {
                errors.add(Field::Room, ROOM_NOT_IN_RECORD);
                break;
            }
        }

        Ok(errors.into_result(parsed)?)
    }

    pub fn create_job(
        &self,
        owner: Uuid,
        record_id: Uuid,
        form: &JobForm,
        room_ids: &[Uuid],
    ) -> Result<Job> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let parsed = self.check(record_id, form, DateRule::Create, room_ids)?;

        let mut job = Job::new(record_id, parsed.name, parsed.description);
        job.job_type = parsed.job_type;
        job.start_date = parsed.start_date;
        job.due_date = parsed.due_date;
        job.room_ids = room_ids.to_vec();
        self.repository.save_job(&job)?;
        Ok(job)
    }

    /// Edit a job; dates already in the past may stay as they are
    pub fn update_job(
        &self,
        owner: Uuid,
        job_id: Uuid,
        form: &JobForm,
        room_ids: &[Uuid],
    ) -> Result<Job> {
        let (mut job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        let rule = DateRule::Edit {
            start: job.start_date,
            due: job.due_date,
        };
        let parsed = self.check(job.record_id, form, rule, room_ids)?;

        job.name = parsed.name;
        job.description = parsed.description;
        job.job_type = parsed.job_type;
        job.start_date = parsed.start_date;
        job.due_date = parsed.due_date;
        job.room_ids = room_ids.to_vec();
        self.repository.save_job(&job)?;
        Ok(job)
    }

    pub fn delete_job(&self, owner: Uuid, job_id: Uuid) -> Result<()> {
        let (job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        self.repository.delete_job(job_id)?;
        if let Some(image) = &job.image {
            self.images.remove(image)?;
        }
        Ok(())
    }

    /// A job is visible to its owner, and to everyone once posted or when
    /// its record is public
    pub fn get_job(&self, viewer: Option<Uuid>, job_id: Uuid) -> Result<Job> {
        let job = self
            .repository
            .get_job(job_id)?
            .ok_or_else(|| Error::not_found(format!("Job {}", job_id)))?;
        if job.is_posted {
            return Ok(job);
        }
        let record = self
            .repository
            .get_record(job.record_id)?
            .ok_or_else(|| Error::not_found(format!("Renovation record {}", job.record_id)))?;
        if record.is_public || viewer == Some(record.owner_id) {
            Ok(job)
        } else {
            Err(Error::forbidden("This job is private"))
        }
    }

    pub fn list_jobs(
        &self,
        owner: Uuid,
        record_id: Uuid,
        status: Option<JobStatus>,
        page: usize,
    ) -> Result<Page<Job>> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let jobs: Vec<Job> = self
            .repository
            .list_jobs_by_record(record_id)?
            .into_iter()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .collect();
        Ok(Page::paginate(jobs, page, self.page_size))
    }

    /// Change status; closing a job also takes it off the listings
    pub fn set_status(&self, owner: Uuid, job_id: Uuid, status: JobStatus) -> Result<Job> {
        let (mut job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        job.set_status(status, today());
        if !status.is_open() {
            job.is_posted = false;
        }
        self.repository.save_job(&job)?;
        Ok(job)
    }

    pub fn post_job(&self, owner: Uuid, job_id: Uuid) -> Result<Job> {
        let (mut job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        if !job.status.is_open() {
            return Err(Error::conflict(format!(
                "A {} job cannot be posted",
                job.status.as_str().to_lowercase()
            )));
        }
        job.is_posted = true;
        self.repository.save_job(&job)?;
        Ok(job)
    }

    pub fn unpost_job(&self, owner: Uuid, job_id: Uuid) -> Result<Job> {
        let (mut job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        job.is_posted = false;
        self.repository.save_job(&job)?;
        Ok(job)
    }

    pub fn set_job_image(&self, owner: Uuid, job_id: Uuid, filename: &str, bytes: &[u8]) -> Result<Job> {
        let (mut job, _) = owned_job(self.repository.as_ref(), owner, job_id)?;
        let previous = job.image.clone();
        self.images.replace(
            ImageKind::Job,
            job_id,
            filename,
            bytes,
            previous.as_deref(),
            |stored| {
                job.image = Some(stored);
                self.repository.save_job(&job)
            },
        )?;
        Ok(job)
    }

    // === Portfolio ===

    /// Showcase a completed job the tradie was hired for
    pub fn add_to_portfolio(&self, tradie: Uuid, job_id: Uuid) -> Result<()> {
        let job = self
            .repository
            .get_job(job_id)?
            .ok_or_else(|| Error::not_found(format!("Job {}", job_id)))?;
        if job.status != JobStatus::Completed {
            return Err(Error::conflict("Only completed jobs can be added to a portfolio"));
        }
        let hired = self
            .repository
            .list_quotes_by_job(job_id)?
            .iter()
            .any(|q| q.tradie_id == tradie && q.status == QuoteStatus::Accepted);
        if !hired {
            return Err(Error::forbidden("Your quote was not accepted for this job"));
        }
        self.repository.add_portfolio_job(tradie, job_id)
    }

    pub fn remove_from_portfolio(&self, tradie: Uuid, job_id: Uuid) -> Result<()> {
        self.repository.remove_portfolio_job(tradie, job_id)
    }

    pub fn portfolio(&self, tradie: Uuid, page: usize) -> Result<Page<Job>> {
        let jobs = self.repository.list_portfolio_jobs(tradie)?;
        Ok(Page::paginate(jobs, page, self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::adapters::offline::PassThroughModerator;
    use crate::config::ModerationSettings;
    use crate::domain::{Location, Quote, Room};
    use crate::services::logging::{EntryPoint, LoggingService};
    use crate::validation::common::format_date;
    use crate::validation::job::START_DATE_PAST;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        repo: Arc<DuckDbRepository>,
        service: JobService,
        owner: Uuid,
        record: RenovationRecord,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let logger = Arc::new(LoggingService::in_memory(EntryPoint::Cli, "test").unwrap());
        let moderation = Arc::new(ModerationService::new(
            Arc::new(PassThroughModerator),
            &ModerationSettings::default(),
            logger,
        ));
        let owner = Uuid::new_v4();
        let record = RenovationRecord::new(owner, "House", "Whole house", Location::default());
        repo.save_record(&record).unwrap();
        Fixture {
            service: JobService::new(repo.clone(), moderation, Arc::new(ImageStore::new(dir.path())), 10),
            _dir: dir,
            repo,
            owner,
            record,
        }
    }

    fn in_days(days: i64) -> String {
        format_date(today() + chrono::Duration::days(days))
    }

    fn job_form(start: &str, due: &str) -> JobForm {
        JobForm {
            name: "Build deck".to_string(),
            description: "Kwila deck off the lounge".to_string(),
            job_type: "Carpentry".to_string(),
            start_date: start.to_string(),
            due_date: due.to_string(),
        }
    }

    #[test]
    fn test_create_job_with_rooms() {
        let f = fixture();
        let room = Room::new(f.record.id, "Lounge");
        f.repo.save_room(&room).unwrap();

        let job = f
            .service
            .create_job(f.owner, f.record.id, &job_form(&in_days(1), &in_days(5)), &[room.id])
            .unwrap();

        let stored = f.repo.get_job(job.id).unwrap().unwrap();
        assert_eq!(stored.room_ids, vec![room.id]);
        assert_eq!(stored.status, JobStatus::NotStarted);
    }

    #[test]
    fn test_rooms_from_other_records_are_rejected() {
        let f = fixture();
        let foreign = Room::new(Uuid::new_v4(), "Garage");
        f.repo.save_room(&foreign).unwrap();

        let err = f
            .service
            .create_job(f.owner, f.record.id, &job_form("", ""), &[foreign.id])
            .unwrap_err();
        assert!(err.validation_errors().unwrap().contains(Field::Room, ROOM_NOT_IN_RECORD));
    }

    #[test]
    fn test_edit_keeps_unchanged_past_date() {
        let f = fixture();
        let mut job = Job::new(f.record.id, "Old job", "Started long ago");
        job.start_date = Some(today() - chrono::Duration::days(30));
        f.repo.save_job(&job).unwrap();

        let unchanged = job_form(&in_days(-30), &in_days(10));
        f.service.update_job(f.owner, job.id, &unchanged, &[]).unwrap();

        let moved = job_form(&in_days(-29), &in_days(10));
        let err = f.service.update_job(f.owner, job.id, &moved, &[]).unwrap_err();
        assert!(err.validation_errors().unwrap().contains(Field::StartDate, START_DATE_PAST));
    }

    #[test]
    fn test_status_and_posting() {
        let f = fixture();
        let job = f.service.create_job(f.owner, f.record.id, &job_form("", ""), &[]).unwrap();

        let posted = f.service.post_job(f.owner, job.id).unwrap();
        assert!(posted.is_posted);

        let done = f.service.set_status(f.owner, job.id, JobStatus::Completed).unwrap();
        assert_eq!(done.completed_on, Some(today()));
        assert!(!done.is_posted);
        assert!(matches!(f.service.post_job(f.owner, job.id), Err(Error::Conflict(_))));

        let reopened = f.service.set_status(f.owner, job.id, JobStatus::InProgress).unwrap();
        assert_eq!(reopened.completed_on, None);
    }

    #[test]
    fn test_list_jobs_filters_by_status() {
        let f = fixture();
        let a = f.service.create_job(f.owner, f.record.id, &job_form("", ""), &[]).unwrap();
        f.service.create_job(f.owner, f.record.id, &job_form("", ""), &[]).unwrap();
        f.service.set_status(f.owner, a.id, JobStatus::Blocked).unwrap();

        let blocked = f
            .service
            .list_jobs(f.owner, f.record.id, Some(JobStatus::Blocked), 1)
            .unwrap();
        assert_eq!(blocked.total_items, 1);
        assert_eq!(f.service.list_jobs(f.owner, f.record.id, None, 1).unwrap().total_items, 2);
        assert!(matches!(
            f.service.list_jobs(Uuid::new_v4(), f.record.id, None, 1),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_portfolio_requires_accepted_quote_on_completed_job() {
        let f = fixture();
        let tradie = Uuid::new_v4();
        let job = f.service.create_job(f.owner, f.record.id, &job_form("", ""), &[]).unwrap();
        let mut quote = Quote::new(job.id, tradie, Decimal::new(300, 0), 2, "Deck");
        f.repo.save_quote(&quote).unwrap();

        assert!(matches!(f.service.add_to_portfolio(tradie, job.id), Err(Error::Conflict(_))));

        f.service.set_status(f.owner, job.id, JobStatus::Completed).unwrap();
        assert!(matches!(f.service.add_to_portfolio(tradie, job.id), Err(Error::Forbidden(_))));

        quote.status = QuoteStatus::Accepted;
        f.repo.save_quote(&quote).unwrap();
        f.service.add_to_portfolio(tradie, job.id).unwrap();
        assert_eq!(f.service.portfolio(tradie, 1).unwrap().items[0].id, job.id);

        f.service.remove_from_portfolio(tradie, job.id).unwrap();
        assert_eq!(f.service.portfolio(tradie, 1).unwrap().total_items, 0);
    }
}
