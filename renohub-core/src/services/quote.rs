//! Quote service - submitting, accepting and rejecting quotes on posted jobs

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Job, JobStatus, Quote, QuoteStatus};
use crate::ports::Repository;
use crate::services::job::{owned_job, today};
use crate::services::logging::{LogEvent, LoggingService};
use crate::services::moderation::ModerationService;
use crate::services::notification::NotificationService;
use crate::services::pagination::Page;
use crate::services::record::DESCRIPTION_PROFANE;
use crate::validation::{validate_quote, Field, QuoteForm, ValidationErrors};

/// Delivery failures are already logged as `email_failed` and leave the
/// quote standing; anything else is a real error
fn mail_is_best_effort(sent: Result<()>) -> Result<()> {
    sent.or_else(|e| match e {
        Error::Mail(_) => Ok(()),
        other => Err(other),
    })
}

pub struct QuoteService {
    repository: Arc<dyn Repository>,
    moderation: Arc<ModerationService>,
    notifications: Arc<NotificationService>,
    page_size: usize,
    logger: Arc<LoggingService>,
}

fn by_status(quotes: Vec<Quote>, status: Option<QuoteStatus>) -> Vec<Quote> {
    quotes
        .into_iter()
        .filter(|q| status.map_or(true, |s| q.status == s))
        .collect()
}

impl QuoteService {
    pub fn new(
        repository: Arc<dyn Repository>,
        moderation: Arc<ModerationService>,
        notifications: Arc<NotificationService>,
        page_size: usize,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            moderation,
            notifications,
            page_size,
            logger,
        }
    }

    fn get_quote(&self, quote_id: Uuid) -> Result<Quote> {
        self.repository
            .get_quote(quote_id)?
            .ok_or_else(|| Error::not_found(format!("Quote {}", quote_id)))
    }

    /// Quote on a job owned by `owner`
    fn owned_quote(&self, owner: Uuid, quote_id: Uuid) -> Result<(Quote, Job)> {
        let quote = self.get_quote(quote_id)?;
        let (job, _) = owned_job(self.repository.as_ref(), owner, quote.job_id)?;
        Ok((quote, job))
    }

    /// Email a tradie about their quote. Mail failures are logged by the
    /// notification service and do not undo the state change.
    fn tell_tradie(&self, job: &Job, quote: &Quote) -> Result<()> {
        let tradie = match self.repository.get_user(quote.tradie_id)? {
            Some(user) => user,
            None => return Ok(()),
        };
        let sent = match quote.status {
            QuoteStatus::Accepted => self.notifications.send_quote_accepted(&tradie, job, quote),
            QuoteStatus::Rejected => self.notifications.send_quote_rejected(&tradie, job, quote),
            QuoteStatus::Pending => Ok(()),
        };
        mail_is_best_effort(sent)
    }

    /// Send a quote for a posted job
    pub fn submit_quote(&self, tradie: Uuid, job_id: Uuid, form: &QuoteForm) -> Result<Quote> {
        let job = self
            .repository
            .get_job(job_id)?
            .ok_or_else(|| Error::not_found(format!("Job {}", job_id)))?;
        if !job.is_posted {
            return Err(Error::conflict("Quotes can only be sent for posted jobs"));
        }
        let record = self
            .repository
            .get_record(job.record_id)?
            .ok_or_else(|| Error::not_found(format!("Renovation record {}", job.record_id)))?;
        if record.is_owned_by(tradie) {
            return Err(Error::forbidden("You cannot quote on your own job"));
        }
        let already_pending = self
            .repository
            .list_quotes_by_job(job_id)?
            .iter()
            .any(|q| q.tradie_id == tradie && q.is_pending());
        if already_pending {
            return Err(Error::conflict("You already have a pending quote for this job"));
        }

        let parsed = validate_quote(form)?;
        let mut errors = ValidationErrors::new();
        self.moderation
            .flag(&mut errors, Field::Description, &parsed.description, DESCRIPTION_PROFANE)?;
        errors.into_result(())?;

        let mut quote = Quote::new(job_id, tradie, parsed.price, parsed.estimated_days, parsed.description);
        quote.email = parsed.email;
        quote.phone = parsed.phone;
        self.repository.save_quote(&quote)?;

        if let (Some(owner), Some(sender)) = (
            self.repository.get_user(record.owner_id)?,
            self.repository.get_user(tradie)?,
        ) {
            mail_is_best_effort(
                self.notifications
                    .send_quote_received(&owner, &job, &quote, &sender),
            )?;
        }

        self.logger
            .emit(LogEvent::new("quote_submitted").with_entity("quote", quote.id));
        Ok(quote)
    }

    /// Accept a pending quote
    ///
    /// Every other pending quote on the job is rejected, the job comes off
    /// the listings and a job that had not started moves to In Progress.
    pub fn accept_quote(&self, owner: Uuid, quote_id: Uuid) -> Result<Quote> {
        let (mut quote, mut job) = self.owned_quote(owner, quote_id)?;
        if !quote.is_pending() {
            return Err(Error::conflict(format!("Quote is already {}", quote.status.as_str().to_lowercase())));
        }

        quote.status = QuoteStatus::Accepted;
        let rejected: Vec<Quote> = self
            .repository
            .list_quotes_by_job(job.id)?
            .into_iter()
            .filter(|other| other.id != quote.id && other.is_pending())
            .map(|mut other| {
                other.status = QuoteStatus::Rejected;
                other
            })
            .collect();

        job.is_posted = false;
        if job.status == JobStatus::NotStarted {
            job.set_status(JobStatus::InProgress, today());
        }

        let mut decided = rejected.clone();
        decided.push(quote.clone());
        self.repository.save_acceptance(&job, &decided)?;

        self.tell_tradie(&job, &quote)?;
        for other in &rejected {
            self.tell_tradie(&job, other)?;
        }

        self.logger
            .emit(LogEvent::new("quote_accepted").with_entity("quote", quote.id));
        Ok(quote)
    }

    pub fn reject_quote(&self, owner: Uuid, quote_id: Uuid) -> Result<Quote> {
        let (mut quote, job) = self.owned_quote(owner, quote_id)?;
        if !quote.is_pending() {
            return Err(Error::conflict(format!("Quote is already {}", quote.status.as_str().to_lowercase())));
        }
        quote.status = QuoteStatus::Rejected;
        self.repository.save_quote(&quote)?;
        self.tell_tradie(&job, &quote)?;
        Ok(quote)
    }

    /// Withdraw a pending quote; only its sender may
    pub fn retract_quote(&self, tradie: Uuid, quote_id: Uuid) -> Result<()> {
        let quote = self.get_quote(quote_id)?;
        if quote.tradie_id != tradie {
            return Err(Error::forbidden("Only the sender can retract a quote"));
        }
        if !quote.is_pending() {
            return Err(Error::conflict("Only pending quotes can be retracted"));
        }
        self.repository.delete_quote(quote_id)
    }

    /// Quotes on the owner's jobs
    pub fn quotes_received(&self, owner: Uuid, status: Option<QuoteStatus>, page: usize) -> Result<Page<Quote>> {
        let quotes = by_status(self.repository.list_quotes_for_owner(owner)?, status);
        Ok(Page::paginate(quotes, page, self.page_size))
    }

    /// Quotes the tradie has sent
    pub fn quotes_sent(&self, tradie: Uuid, status: Option<QuoteStatus>, page: usize) -> Result<Page<Quote>> {
        let quotes = by_status(self.repository.list_quotes_by_tradie(tradie)?, status);
        Ok(Page::paginate(quotes, page, self.page_size))
    }

    pub fn quotes_for_job(&self, owner: Uuid, job_id: Uuid) -> Result<Vec<Quote>> {
        owned_job(self.repository.as_ref(), owner, job_id)?;
        self.repository.list_quotes_by_job(job_id)
    }

    pub fn quote(&self, viewer: Uuid, quote_id: Uuid) -> Result<Quote> {
        let quote = self.get_quote(quote_id)?;
        if quote.tradie_id == viewer {
            return Ok(quote);
        }
        owned_job(self.repository.as_ref(), viewer, quote.job_id)?;
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::adapters::mail::RecordingMailer;
    use crate::adapters::offline::PassThroughModerator;
    use crate::config::ModerationSettings;
    use crate::domain::{Location, RenovationRecord, User};
    use crate::services::logging::EntryPoint;
    use crate::validation::quote::CONTACT_REQUIRED;

    struct Fixture {
        repo: Arc<DuckDbRepository>,
        mailer: Arc<RecordingMailer>,
        service: QuoteService,
        owner: User,
        job: Job,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let logger = Arc::new(LoggingService::in_memory(EntryPoint::Cli, "test").unwrap());
        let mailer = Arc::new(RecordingMailer::new());
        let moderation = Arc::new(ModerationService::new(
            Arc::new(PassThroughModerator),
            &ModerationSettings::default(),
            Arc::clone(&logger),
        ));
        let notifications = Arc::new(NotificationService::new(
            mailer.clone(),
            "http://localhost:8080",
            Arc::clone(&logger),
        ));

        let owner = User::new("Olivia", None, "olivia@example.com", "hash");
        repo.save_user(&owner).unwrap();
        let record = RenovationRecord::new(owner.id, "House", "Whole house", Location::default());
        repo.save_record(&record).unwrap();
        let mut job = Job::new(record.id, "Retile", "Retile the bathroom");
        job.is_posted = true;
        repo.save_job(&job).unwrap();

        Fixture {
            service: QuoteService::new(repo.clone(), moderation, notifications, 10, logger),
            repo,
            mailer,
            owner,
            job,
        }
    }

    impl Fixture {
        fn tradie(&self, email: &str) -> User {
            let user = User::new("Tane", None, email, "hash");
            self.repo.save_user(&user).unwrap();
            user
        }
    }

    fn form(price: &str) -> QuoteForm {
        QuoteForm {
            price: price.to_string(),
            estimated_days: "3".to_string(),
            description: "Strip and retile".to_string(),
            email: "tradie@example.com".to_string(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_submit_emails_owner() {
        let f = fixture();
        let tradie = f.tradie("t1@example.com");

        let quote = f.service.submit_quote(tradie.id, f.job.id, &form("$1,200.50")).unwrap();

        assert_eq!(quote.price.to_string(), "1200.50");
        assert!(quote.is_pending());
        assert_eq!(f.mailer.sent_to("olivia@example.com").len(), 1);
    }

    #[test]
    fn test_submit_rules() {
        let f = fixture();
        let tradie = f.tradie("t1@example.com");

        assert!(matches!(
            f.service.submit_quote(f.owner.id, f.job.id, &form("100")),
            Err(Error::Forbidden(_))
        ));

        let mut no_contact = form("100");
        no_contact.email.clear();
        let err = f.service.submit_quote(tradie.id, f.job.id, &no_contact).unwrap_err();
        assert!(err.validation_errors().unwrap().iter().any(|e| e.message == CONTACT_REQUIRED));

        f.service.submit_quote(tradie.id, f.job.id, &form("100")).unwrap();
        assert!(matches!(
            f.service.submit_quote(tradie.id, f.job.id, &form("90")),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_accept_rejects_siblings_and_starts_job() {
        let f = fixture();
        let winner = f.tradie("win@example.com");
        let loser = f.tradie("lose@example.com");
        let chosen = f.service.submit_quote(winner.id, f.job.id, &form("500")).unwrap();
        let other = f.service.submit_quote(loser.id, f.job.id, &form("450")).unwrap();

        f.service.accept_quote(f.owner.id, chosen.id).unwrap();

        assert_eq!(f.repo.get_quote(chosen.id).unwrap().unwrap().status, QuoteStatus::Accepted);
        assert_eq!(f.repo.get_quote(other.id).unwrap().unwrap().status, QuoteStatus::Rejected);
        let job = f.repo.get_job(f.job.id).unwrap().unwrap();
        assert!(!job.is_posted);
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(f.mailer.sent_to("win@example.com")[0].subject, "Quote accepted: Retile");
        assert_eq!(f.mailer.sent_to("lose@example.com")[0].subject, "Quote declined: Retile");

        assert!(matches!(
            f.service.accept_quote(f.owner.id, other.id),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_mail_failure_does_not_undo_acceptance() {
        let f = fixture();
        let tradie = f.tradie("t@example.com");
        let quote = f.service.submit_quote(tradie.id, f.job.id, &form("500")).unwrap();
        f.mailer.set_failing(true);

        f.service.accept_quote(f.owner.id, quote.id).unwrap();
        assert_eq!(f.repo.get_quote(quote.id).unwrap().unwrap().status, QuoteStatus::Accepted);
    }

    #[test]
    fn test_failed_owner_email_keeps_submitted_quote() {
        let f = fixture();
        let tradie = f.tradie("t@example.com");
        f.mailer.set_failing(true);

        let quote = f.service.submit_quote(tradie.id, f.job.id, &form("500")).unwrap();
        assert!(f.repo.get_quote(quote.id).unwrap().is_some());
    }

    #[test]
    fn test_only_mail_errors_are_swallowed() {
        assert!(mail_is_best_effort(Err(Error::Mail("smtp down".into()))).is_ok());
        assert!(matches!(
            mail_is_best_effort(Err(Error::database("gone"))),
            Err(Error::Database(_))
        ));
    }

    #[test]
    fn test_retract_only_own_pending() {
        let f = fixture();
        let tradie = f.tradie("t@example.com");
        let quote = f.service.submit_quote(tradie.id, f.job.id, &form("500")).unwrap();

        assert!(matches!(
            f.service.retract_quote(Uuid::new_v4(), quote.id),
            Err(Error::Forbidden(_))
        ));
        f.service.retract_quote(tradie.id, quote.id).unwrap();
        assert!(f.repo.get_quote(quote.id).unwrap().is_none());
    }

    #[test]
    fn test_received_and_sent_lists() {
        let f = fixture();
        let a = f.tradie("a@example.com");
        let b = f.tradie("b@example.com");
        let qa = f.service.submit_quote(a.id, f.job.id, &form("500")).unwrap();
        f.service.submit_quote(b.id, f.job.id, &form("600")).unwrap();
        f.service.reject_quote(f.owner.id, qa.id).unwrap();

        let received = f.service.quotes_received(f.owner.id, None, 1).unwrap();
        assert_eq!(received.total_items, 2);
        let pending = f
            .service
            .quotes_received(f.owner.id, Some(QuoteStatus::Pending), 1)
            .unwrap();
        assert_eq!(pending.total_items, 1);

        let sent = f.service.quotes_sent(a.id, Some(QuoteStatus::Rejected), 1).unwrap();
        assert_eq!(sent.items[0].id, qa.id);
        assert_eq!(f.service.quotes_for_job(f.owner.id, f.job.id).unwrap().len(), 2);
    }
}
