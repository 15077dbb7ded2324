//! Listing search over posted jobs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Job, JobType, RenovationRecord};
use crate::ports::Repository;
use crate::services::pagination::Page;
use crate::validation::common::fold;
use crate::validation::normalize_tag;

/// Listing filters; every set filter must match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingFilter {
    /// Job name or description, ignoring case and accents
    pub keyword: Option<String>,
    /// Any of these types
    #[serde(default)]
    pub job_types: Vec<JobType>,
    pub city: Option<String>,
    pub suburb: Option<String>,
    /// All of these tags on the job's record
    #[serde(default)]
    pub tags: Vec<String>,
    /// Inclusive
    pub start_after: Option<NaiveDate>,
    /// Inclusive
    pub due_before: Option<NaiveDate>,
}

/// A posted job with the place it is in
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub job: Job,
    pub record_name: String,
    pub city: String,
    pub suburb: Option<String>,
}

/// Filter values prepared once per search
struct Prepared {
    keyword: Option<String>,
    job_types: Vec<JobType>,
    city: Option<String>,
    suburb: Option<String>,
    tags: Vec<String>,
    start_after: Option<NaiveDate>,
    due_before: Option<NaiveDate>,
}

fn folded(value: Option<&str>) -> Option<String> {
    value
        .map(|v| fold(v.trim()))
        .filter(|v| !v.is_empty())
}

impl Prepared {
    fn from(filter: &ListingFilter) -> Self {
        let mut tags: Vec<String> = filter
            .tags
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();

        Self {
            keyword: folded(filter.keyword.as_deref()),
            job_types: filter.job_types.clone(),
            city: folded(filter.city.as_deref()),
            suburb: folded(filter.suburb.as_deref()),
            tags,
            start_after: filter.start_after,
            due_before: filter.due_before,
        }
    }

    fn matches_job(&self, job: &Job) -> bool {
        if let Some(k) = &self.keyword {
            if !fold(&job.name).contains(k.as_str()) && !fold(&job.description).contains(k.as_str()) {
                return false;
            }
        }
        if !self.job_types.is_empty()
            && !job.job_type.map_or(false, |t| self.job_types.contains(&t))
        {
            return false;
        }
        if let Some(bound) = self.start_after {
            if !job.start_date.map_or(false, |d| d >= bound) {
                return false;
            }
        }
        if let Some(bound) = self.due_before {
            if !job.due_date.map_or(false, |d| d <= bound) {
                return false;
            }
        }
        true
    }

    fn matches_place(&self, record: &RenovationRecord) -> bool {
        if let Some(c) = &self.city {
            if fold(record.location.city.trim()) != *c {
                return false;
            }
        }
        if let Some(s) = &self.suburb {
            let suburb = record.location.suburb.as_deref().map(|v| fold(v.trim()));
            if suburb.as_deref() != Some(s.as_str()) {
                return false;
            }
        }
        true
    }
}

pub struct SearchService {
    repository: Arc<dyn Repository>,
    page_size: usize,
}

impl SearchService {
    pub fn new(repository: Arc<dyn Repository>, page_size: usize) -> Self {
        Self {
            repository,
            page_size,
        }
    }

    /// Posted jobs matching `filter`, newest first
    ///
    /// Posting publishes a job whatever its record's visibility.
    pub fn search_listings(&self, filter: &ListingFilter, page: usize) -> Result<Page<Listing>> {
        let prepared = Prepared::from(filter);
        let mut records: HashMap<Uuid, Option<RenovationRecord>> = HashMap::new();
        let mut tags: HashMap<Uuid, Vec<String>> = HashMap::new();
        let mut listings = Vec::new();

        for job in self.repository.list_posted_jobs()? {
            if !prepared.matches_job(&job) {
                continue;
            }

            if !records.contains_key(&job.record_id) {
                let record = self.repository.get_record(job.record_id)?;
                records.insert(job.record_id, record);
            }
            let record = match records.get(&job.record_id).and_then(Option::as_ref) {
                Some(record) => record,
                None => continue,
            };
            if !prepared.matches_place(record) {
                continue;
            }

            if !prepared.tags.is_empty() {
                if !tags.contains_key(&record.id) {
                    let names = self
                        .repository
                        .list_tags(record.id)?
                        .into_iter()
                        .map(|t| t.name)
                        .collect();
                    tags.insert(record.id, names);
                }
                let on_record = tags.get(&record.id).map(Vec::as_slice).unwrap_or(&[]);
                if !prepared.tags.iter().all(|t| on_record.contains(t)) {
                    continue;
                }
            }

            listings.push(Listing {
                record_name: record.name.clone(),
                city: record.location.city.clone(),
                suburb: record.location.suburb.clone(),
                job,
            });
        }

        Ok(Page::paginate(listings, page, self.page_size))
    }
}
