//! Comparison service - side-by-side tradie metrics for quotes

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Job, Quote};
use crate::ports::Repository;

/// "At least as good as" on each metric, from the first quote's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradieComparison {
    pub rating: bool,
    pub price: bool,
    pub completed_jobs: bool,
    pub estimated_time: bool,
    pub efficiency: bool,
}

/// Track record shown next to a quote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradieProfile {
    pub user_id: Uuid,
    pub average_rating: f64,
    pub rating_count: usize,
    pub completed_jobs: usize,
    pub efficiency: f64,
}

/// Mean of actual/planned durations over jobs with a start, due and
/// completion date, rounded to two decimals. Planned days are at least 1;
/// jobs completed on or before their start date do not count. `0.0` when
/// nothing counts.
pub fn efficiency_of(jobs: &[Job]) -> f64 {
    let ratios: Vec<f64> = jobs.iter().filter_map(job_ratio).collect();
    if ratios.is_empty() {
        return 0.0;
    }
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    round2(mean)
}

fn job_ratio(job: &Job) -> Option<f64> {
    let (start, due, completed) = (job.start_date?, job.due_date?, job.completed_on?);
    let planned = days_between(start, due).max(1);
    let actual = days_between(start, completed);
    if actual <= 0 {
        return None;
    }
    Some(actual as f64 / planned as f64)
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Half away from zero, like `f64::round`
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of `values`, `0.0` when empty
fn mean_rating(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

pub struct ComparisonService {
    repository: Arc<dyn Repository>,
}

impl ComparisonService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Mean received rating, `0.0` when unrated
    pub fn average_rating(&self, user_id: Uuid) -> Result<f64> {
        let values: Vec<u8> = self
            .repository
            .list_ratings_for(user_id)?
            .iter()
            .map(|r| r.value)
            .collect();
        Ok(mean_rating(&values))
    }

    /// Completed jobs on which the tradie's quote was accepted
    pub fn completed_job_count(&self, user_id: Uuid) -> Result<usize> {
        Ok(self.repository.list_completed_jobs_for_tradie(user_id)?.len())
    }

    pub fn work_efficiency(&self, user_id: Uuid) -> Result<f64> {
        let jobs = self.repository.list_completed_jobs_for_tradie(user_id)?;
        Ok(efficiency_of(&jobs))
    }

    pub fn tradie_profile(&self, user_id: Uuid) -> Result<TradieProfile> {
        let ratings = self.repository.list_ratings_for(user_id)?;
        let values: Vec<u8> = ratings.iter().map(|r| r.value).collect();
        let jobs = self.repository.list_completed_jobs_for_tradie(user_id)?;

        Ok(TradieProfile {
            user_id,
            average_rating: mean_rating(&values),
            rating_count: values.len(),
            completed_jobs: jobs.len(),
            efficiency: efficiency_of(&jobs),
        })
    }

    /// Compare the senders of two quotes
    pub fn compare_quotes(&self, first: &Quote, second: &Quote) -> Result<TradieComparison> {
        let a = self.tradie_profile(first.tradie_id)?;
        let b = self.tradie_profile(second.tradie_id)?;

        Ok(TradieComparison {
            rating: a.average_rating >= b.average_rating,
            price: first.price <= second.price,
            completed_jobs: a.completed_jobs >= b.completed_jobs,
            estimated_time: first.estimated_days <= second.estimated_days,
            efficiency: a.efficiency <= b.efficiency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::{JobStatus, Location, Rating, RenovationRecord, User};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn finished_job(start: NaiveDate, due: NaiveDate, done: NaiveDate) -> Job {
        let mut job = Job::new(Uuid::new_v4(), "Deck", "Build a deck");
        job.start_date = Some(start);
        job.due_date = Some(due);
        job.set_status(JobStatus::Completed, done);
        job
    }

    #[test]
    fn test_efficiency_mean_of_ratios() {
        let jobs = vec![
            // 10 planned, 5 actual
            finished_job(date(2024, 1, 1), date(2024, 1, 11), date(2024, 1, 6)),
            // 4 planned, 6 actual
            finished_job(date(2024, 2, 1), date(2024, 2, 5), date(2024, 2, 7)),
        ];
        assert_eq!(efficiency_of(&jobs), 1.0);
    }

    #[test]
    fn test_efficiency_rounds_to_two_decimals() {
        // 3 planned, 1 actual
        let jobs = vec![finished_job(date(2024, 1, 1), date(2024, 1, 4), date(2024, 1, 2))];
        assert_eq!(efficiency_of(&jobs), 0.33);
    }

    #[test]
    fn test_efficiency_clamps_planned_and_skips_same_day() {
        let same_day_due = finished_job(date(2024, 1, 1), date(2024, 1, 1), date(2024, 1, 3));
        let done_at_start = finished_job(date(2024, 1, 1), date(2024, 1, 5), date(2024, 1, 1));
        assert_eq!(efficiency_of(&[same_day_due]), 2.0);
        assert_eq!(efficiency_of(&[done_at_start]), 0.0);
    }

    #[test]
    fn test_efficiency_ignores_jobs_missing_dates() {
        let mut job = Job::new(Uuid::new_v4(), "Paint", "Paint");
        job.set_status(JobStatus::Completed, date(2024, 3, 1));
        assert_eq!(efficiency_of(&[job]), 0.0);
        assert_eq!(efficiency_of(&[]), 0.0);
    }

    struct Fixture {
        repo: Arc<DuckDbRepository>,
        service: ComparisonService,
        owner: User,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let owner = User::new("Hana", Some("Owner".into()), "hana@example.com", "hash");
        repo.save_user(&owner).unwrap();
        Fixture {
            service: ComparisonService::new(repo.clone()),
            repo,
            owner,
        }
    }

    impl Fixture {
        fn tradie(&self, email: &str) -> User {
            let user = User::new("Tama", Some("Tradie".into()), email, "hash");
            self.repo.save_user(&user).unwrap();
            user
        }

        fn completed_job_for(&self, tradie: &User, rating: Option<u8>) {
            let record = RenovationRecord::new(self.owner.id, "House", "Whole house", Location::default());
            self.repo.save_record(&record).unwrap();
            let mut job = Job::new(record.id, "Deck", "Build a deck");
            job.start_date = Some(date(2024, 1, 1));
            job.due_date = Some(date(2024, 1, 11));
            job.set_status(JobStatus::Completed, date(2024, 1, 6));
            self.repo.save_job(&job).unwrap();

            let mut quote = Quote::new(job.id, tradie.id, Decimal::new(500, 0), 5, "Deck quote");
            quote.status = crate::domain::QuoteStatus::Accepted;
            self.repo.save_quote(&quote).unwrap();

            if let Some(value) = rating {
                self.repo
                    .save_rating(&Rating::new(self.owner.id, tradie.id, job.id, value))
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_compare_quotes_all_metrics() {
        let f = fixture();
        let experienced = f.tradie("exp@example.com");
        let newcomer = f.tradie("new@example.com");
        f.completed_job_for(&experienced, Some(4));

        let job_id = Uuid::new_v4();
        let q_exp = Quote::new(job_id, experienced.id, Decimal::new(900, 0), 10, "Quote A");
        let q_new = Quote::new(job_id, newcomer.id, Decimal::new(700, 0), 10, "Quote B");

        let cmp = f.service.compare_quotes(&q_exp, &q_new).unwrap();
        assert!(cmp.rating);
        assert!(!cmp.price);
        assert!(cmp.completed_jobs);
        assert!(cmp.estimated_time);
        // 0.5 against 0.0
        assert!(!cmp.efficiency);

        let reverse = f.service.compare_quotes(&q_new, &q_exp).unwrap();
        assert!(!reverse.rating);
        assert!(reverse.price);
        assert!(!reverse.completed_jobs);
        assert!(reverse.estimated_time);
        assert!(reverse.efficiency);
    }

    #[test]
    fn test_tradie_profile() {
        let f = fixture();
        let tradie = f.tradie("t@example.com");
        f.completed_job_for(&tradie, Some(5));
        f.completed_job_for(&tradie, Some(2));

        let profile = f.service.tradie_profile(tradie.id).unwrap();
        assert_eq!(profile.rating_count, 2);
        assert_eq!(profile.average_rating, 3.5);
        assert_eq!(profile.completed_jobs, 2);
        assert_eq!(profile.efficiency, 0.5);
        assert_eq!(f.service.average_rating(Uuid::new_v4()).unwrap(), 0.0);
    }

    #[test]
    fn test_unrated_tradie_metrics() {
        let f = fixture();
        let tradie = f.tradie("fresh@example.com");
        assert_eq!(f.service.completed_job_count(tradie.id).unwrap(), 0);
        assert_eq!(f.service.work_efficiency(tradie.id).unwrap(), 0.0);

        f.completed_job_for(&tradie, None);
        assert_eq!(f.service.completed_job_count(tradie.id).unwrap(), 1);
        assert_eq!(f.service.work_efficiency(tradie.id).unwrap(), 0.5);
    }
}
