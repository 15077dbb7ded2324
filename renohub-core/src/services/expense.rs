//! Expense service - per-job costs, totals and CSV export

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Expense, ExpenseCategory};
use crate::ports::Repository;
use crate::services::job::{owned_job, today};
use crate::services::pagination::Page;
use crate::services::record::owned_record;
use crate::validation::common::format_date;
use crate::validation::{validate_expense, ExpenseForm};

/// Spend in one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub total: Decimal,
}

pub struct ExpenseService {
    repository: Arc<dyn Repository>,
    page_size: usize,
}

impl ExpenseService {
    pub fn new(repository: Arc<dyn Repository>, page_size: usize) -> Self {
        Self {
            repository,
            page_size,
        }
    }

    pub fn add_expense(&self, owner: Uuid, job_id: Uuid, form: &ExpenseForm) -> Result<Expense> {
        owned_job(self.repository.as_ref(), owner, job_id)?;
        let parsed = validate_expense(form, today())?;

        let expense = Expense::new(job_id, parsed.name, parsed.cost, parsed.category, parsed.date);
        self.repository.save_expense(&expense)?;
        Ok(expense)
    }

    pub fn delete_expense(&self, owner: Uuid, expense_id: Uuid) -> Result<()> {
        let expense = self
            .repository
            .get_expense(expense_id)?
            .ok_or_else(|| Error::not_found(format!("Expense {}", expense_id)))?;
        owned_job(self.repository.as_ref(), owner, expense.job_id)?;
        self.repository.delete_expense(expense_id)
    }

    pub fn list_expenses(&self, owner: Uuid, job_id: Uuid, page: usize) -> Result<Page<Expense>> {
        owned_job(self.repository.as_ref(), owner, job_id)?;
        let expenses = self.repository.list_expenses_by_job(job_id)?;
        Ok(Page::paginate(expenses, page, self.page_size))
    }

    pub fn job_total(&self, owner: Uuid, job_id: Uuid) -> Result<Decimal> {
        owned_job(self.repository.as_ref(), owner, job_id)?;
        Ok(self
            .repository
            .list_expenses_by_job(job_id)?
            .iter()
            .map(|e| e.cost)
            .sum())
    }

    pub fn record_total(&self, owner: Uuid, record_id: Uuid) -> Result<Decimal> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        Ok(self
            .repository
            .list_expenses_by_record(record_id)?
            .iter()
            .map(|e| e.cost)
            .sum())
    }

    /// Totals per category, in category order, omitting empty categories
    pub fn record_totals_by_category(&self, owner: Uuid, record_id: Uuid) -> Result<Vec<CategoryTotal>> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let mut totals: BTreeMap<ExpenseCategory, Decimal> = BTreeMap::new();
        for expense in self.repository.list_expenses_by_record(record_id)? {
            *totals.entry(expense.category).or_default() += expense.cost;
        }
        Ok(totals
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect())
    }

    /// Write the record's expenses as CSV: job, name, category, date, cost.
    /// Returns the number of rows written.
    pub fn export_csv<W: Write>(&self, owner: Uuid, record_id: Uuid, out: W) -> Result<usize> {
        owned_record(self.repository.as_ref(), owner, record_id)?;
        let job_names: HashMap<Uuid, String> = self
            .repository
            .list_jobs_by_record(record_id)?
            .into_iter()
            .map(|j| (j.id, j.name))
            .collect();
        let expenses = self.repository.list_expenses_by_record(record_id)?;

        let csv_err = |e: csv::Error| Error::Other(format!("CSV export failed: {}", e));
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record(["Job", "Name", "Category", "Date", "Cost"])
            .map_err(csv_err)?;
        for expense in &expenses {
            let job = job_names.get(&expense.job_id).map(String::as_str).unwrap_or("");
            writer
                .write_record([
                    job,
                    expense.name.as_str(),
                    expense.category.as_str(),
                    format_date(expense.date).as_str(),
                    format!("{:.2}", expense.cost).as_str(),
                ])
                .map_err(csv_err)?;
        }
        writer.flush()?;
        Ok(expenses.len())
    }
}
