use std::path::PathBuf;

use anyhow::Context;

use super::files;
use crate::models::expenses::{Expense, ExpenseDraft};

/// The durable expense table. Every write rewrites the whole file.
#[derive(Clone)]
pub struct ExpenseRepository {
    path: PathBuf,
}

impl ExpenseRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> Result<Vec<Expense>, anyhow::Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut expenses = Vec::new();
        for (line, row) in reader.deserialize::<Expense>().enumerate() {
            let expense = row.with_context(|| {
                format!("Failed to parse {} at record {}", self.path.display(), line + 1)
            })?;
            expenses.push(expense);
        }

        Ok(expenses)
    }

    pub fn list_for(&self, username: &str) -> Result<Vec<Expense>, anyhow::Error> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|e| e.username == username)
            .collect())
    }

    pub fn append(&self, new_expenses: &[Expense]) -> Result<(), anyhow::Error> {
        if new_expenses.is_empty() {
            return Ok(());
        }

        let mut all = self.load_all()?;
        all.extend_from_slice(new_expenses);
        self.save_all(&all)
    }

    pub fn update(
        &self,
        username: &str,
        id: &str,
        draft: ExpenseDraft,
    ) -> Result<Option<Expense>, anyhow::Error> {
        let mut all = self.load_all()?;
        let Some(expense) = all
            .iter_mut()
            .find(|e| e.username == username && e.has_id(id))
        else {
            return Ok(None);
        };

        expense.apply(draft);
        let updated = expense.clone();
        self.save_all(&all)?;

        Ok(Some(updated))
    }

    pub fn remove(&self, username: &str, id: &str) -> Result<bool, anyhow::Error> {
        let mut all = self.load_all()?;
        let before = all.len();
        all.retain(|e| !(e.username == username && e.has_id(id)));

        if all.len() == before {
            return Ok(false);
        }

        self.save_all(&all)?;
        Ok(true)
    }

    fn save_all(&self, expenses: &[Expense]) -> Result<(), anyhow::Error> {
        files::write_atomic(&self.path, |writer| {
            let mut csv_writer = csv::Writer::from_writer(writer);
            if expenses.is_empty() {
                csv_writer.write_record([
                    "id",
                    "username",
                    "date",
                    "category",
                    "amount",
                    "description",
                ])?;
            }
            for expense in expenses {
                csv_writer.serialize(expense)?;
            }
            csv_writer.flush()?;
            Ok(())
        })
    }
}
