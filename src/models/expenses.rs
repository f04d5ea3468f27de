use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"));

static CATEGORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} &'_-]{0,49}$").expect("valid category pattern")
});

pub const MISSING_FIELDS: &str =
    "Please fill in all required fields and enter a valid positive amount.";
pub const INVALID_DATE: &str = "Invalid date format. Please use YYYY-MM-DD.";
pub const INVALID_CATEGORY: &str =
    "Invalid category. Use letters, numbers, spaces and & ' _ - (up to 50 characters).";

/// One row of the expense table. Field order is the CSV column order.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Expense {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: String,
    pub date: NaiveDate,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

impl Expense {
    pub fn new(username: &str, draft: ExpenseDraft) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().hyphenated().to_string()),
            username: username.to_string(),
            date: draft.date,
            category: draft.category,
            amount: draft.amount,
            description: draft.description,
        }
    }

    pub fn apply(&mut self, draft: ExpenseDraft) {
        self.date = draft.date;
        self.category = draft.category;
        self.amount = draft.amount;
        self.description = draft.description;
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }
}

/// Validated expense fields, ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseDraft {
    pub date: NaiveDate,
    pub category: String,
    pub amount: f64,
    pub description: String,
}

/// Raw add/edit form body. Everything arrives as text so bad input can be
/// reported back instead of rejected by the extractor.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExpenseForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub description: String,
}

impl ExpenseForm {
    pub fn validate(&self) -> Result<ExpenseDraft, String> {
        let date = self.date.trim();
        let category = self.category.trim();
        let amount = self.amount.trim().parse::<f64>().ok();

        let amount = match amount {
            Some(amount) if amount.is_finite() && amount > 0.0 => amount,
            _ => return Err(MISSING_FIELDS.to_string()),
        };
        if date.is_empty() || category.is_empty() {
            return Err(MISSING_FIELDS.to_string());
        }

        if !DATE_PATTERN.is_match(date) {
            return Err(INVALID_DATE.to_string());
        }
        let date =
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| INVALID_DATE.to_string())?;

        if !CATEGORY_PATTERN.is_match(category) {
            return Err(INVALID_CATEGORY.to_string());
        }

        Ok(ExpenseDraft {
            date,
            category: category.to_string(),
            amount,
            description: self.description.trim().to_string(),
        })
    }
}

impl From<&Expense> for ExpenseForm {
    fn from(expense: &Expense) -> Self {
        Self {
            date: expense.date.format("%Y-%m-%d").to_string(),
            category: expense.category.clone(),
            amount: expense.amount.to_string(),
            description: expense.description.clone(),
        }
    }
}

/// An expense as shown to its owner. `pending` entries live only in the
/// cache until the next save.
#[derive(Clone, Debug, PartialEq)]
pub struct ListedExpense {
    pub expense: Expense,
    pub pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(date: &str, category: &str, amount: &str) -> ExpenseForm {
        ExpenseForm {
            date: date.to_string(),
            category: category.to_string(),
            amount: amount.to_string(),
            description: "  lunch with team ".to_string(),
        }
    }

    #[test]
    fn valid_form_produces_trimmed_draft() {
        let draft = form("2024-03-15", " Food ", "12.50").validate().unwrap();

        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(draft.category, "Food");
        assert_eq!(draft.amount, 12.5);
        assert_eq!(draft.description, "lunch with team");
    }

    #[test]
    fn amount_must_be_positive() {
        assert_eq!(form("2024-03-15", "Food", "0").validate(), Err(MISSING_FIELDS.to_string()));
        assert_eq!(form("2024-03-15", "Food", "-3").validate(), Err(MISSING_FIELDS.to_string()));
        assert_eq!(form("2024-03-15", "Food", "ten").validate(), Err(MISSING_FIELDS.to_string()));
        assert_eq!(form("2024-03-15", "Food", "inf").validate(), Err(MISSING_FIELDS.to_string()));
        assert!(form("2024-03-15", "Food", "0.01").validate().is_ok());
    }

    #[test]
    fn required_fields_are_checked_before_date_format() {
        assert_eq!(form("", "Food", "5").validate(), Err(MISSING_FIELDS.to_string()));
        assert_eq!(form("2024-03-15", "  ", "5").validate(), Err(MISSING_FIELDS.to_string()));
        assert_eq!(form("garbage", "", "5").validate(), Err(MISSING_FIELDS.to_string()));
    }

    #[test]
    fn date_must_be_a_real_iso_day() {
        assert_eq!(form("15/03/2024", "Food", "5").validate(), Err(INVALID_DATE.to_string()));
        assert_eq!(form("2024-3-15", "Food", "5").validate(), Err(INVALID_DATE.to_string()));
        assert_eq!(form("2023-02-29", "Food", "5").validate(), Err(INVALID_DATE.to_string()));
        assert_eq!(form("2024-13-01", "Food", "5").validate(), Err(INVALID_DATE.to_string()));
        assert!(form("2024-02-29", "Food", "5").validate().is_ok());
    }

    #[test]
    fn category_pattern() {
        assert!(form("2024-03-15", "Rent & Utilities", "5").validate().is_ok());
        assert!(form("2024-03-15", "Café", "5").validate().is_ok());
        assert!(form("2024-03-15", "kid's-stuff_2", "5").validate().is_ok());
        assert_eq!(form("2024-03-15", "-Food", "5").validate(), Err(INVALID_CATEGORY.to_string()));
        assert_eq!(
            form("2024-03-15", "Food<script>", "5").validate(),
            Err(INVALID_CATEGORY.to_string())
        );
        assert_eq!(
            form("2024-03-15", &"a".repeat(51), "5").validate(),
            Err(INVALID_CATEGORY.to_string())
        );
    }

    #[test]
    fn new_expense_gets_an_id_and_owner() {
        let draft = form("2024-03-15", "Food", "5").validate().unwrap();
        let expense = Expense::new("alice", draft);

        assert_eq!(expense.username, "alice");
        assert!(expense.id.is_some());
        assert!(expense.has_id(expense.id.as_deref().unwrap()));
        assert!(!expense.has_id("other"));
    }

    #[test]
    fn form_round_trips_from_expense() {
        let draft = form("2024-03-15", "Food", "7.25").validate().unwrap();
        let expense = Expense::new("alice", draft.clone());

        assert_eq!(ExpenseForm::from(&expense).validate(), Ok(draft));
    }
}
