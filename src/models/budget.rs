use chrono::{Datelike, NaiveDate};

use super::expenses::Expense;

#[derive(Clone, Debug, PartialEq)]
pub struct BudgetStatus {
    pub year: i32,
    pub month: u32,
    pub budget: f64,
    pub spent: f64,
}

impl BudgetStatus {
    /// Sums the expenses dated in the same calendar month as `today`.
    pub fn compute<'a, I>(budget: f64, expenses: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a Expense>,
    {
        let spent = expenses
            .into_iter()
            .filter(|e| e.date.year() == today.year() && e.date.month() == today.month())
            .map(|e| e.amount)
            .sum();

        Self {
            year: today.year(),
            month: today.month(),
            budget,
            spent,
        }
    }

    /// Amounts are compared in whole cents so float sums such as
    /// `0.1 + 0.2` match a budget of `0.30`.
    pub fn remaining(&self) -> f64 {
        (cents(self.budget) - cents(self.spent)) as f64 / 100.0
    }

    pub fn exceeded(&self) -> bool {
        cents(self.spent) > cents(self.budget)
    }

    pub fn message(&self) -> String {
        if self.exceeded() {
            "You have exceeded your budget!".to_string()
        } else {
            format!("You have {:.2} left for the month.", self.remaining())
        }
    }
}

fn cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(date: (i32, u32, u32), amount: f64) -> Expense {
        Expense {
            id: None,
            username: "alice".to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            category: "Food".to_string(),
            amount,
            description: String::new(),
        }
    }

    #[test]
    fn only_current_month_counts() {
        let expenses = vec![
            expense((2024, 3, 1), 10.0),
            expense((2024, 3, 31), 15.5),
            expense((2024, 2, 29), 100.0),
            expense((2023, 3, 10), 100.0),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();

        let status = BudgetStatus::compute(50.0, &expenses, today);

        assert_eq!(status.spent, 25.5);
        assert_eq!(status.remaining(), 24.5);
        assert!(!status.exceeded());
        assert_eq!(status.message(), "You have 24.50 left for the month.");
    }

    #[test]
    fn spending_equal_to_budget_is_not_exceeded() {
        let expenses = vec![expense((2024, 3, 1), 50.0)];
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let status = BudgetStatus::compute(50.0, &expenses, today);

        assert!(!status.exceeded());
        assert_eq!(status.message(), "You have 0.00 left for the month.");
    }

    #[test]
    fn cent_amounts_that_add_up_to_the_budget() {
        let expenses = vec![expense((2024, 3, 1), 0.10), expense((2024, 3, 2), 0.20)];
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let status = BudgetStatus::compute(0.30, &expenses, today);

        assert!(!status.exceeded());
        assert_eq!(status.remaining(), 0.0);
        assert_eq!(status.message(), "You have 0.00 left for the month.");
    }

    #[test]
    fn exceeding_the_budget() {
        let expenses = vec![expense((2024, 3, 1), 50.01)];
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let status = BudgetStatus::compute(50.0, &expenses, today);

        assert!(status.exceeded());
        assert_eq!(status.message(), "You have exceeded your budget!");
    }

    #[test]
    fn zero_budget_with_no_spending() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let status = BudgetStatus::compute(0.0, &Vec::<Expense>::new(), today);

        assert_eq!(status.spent, 0.0);
        assert_eq!(status.message(), "You have 0.00 left for the month.");
    }
}
