use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("valid username pattern"));

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub monthly_budget: f64,
}

/// Login and registration form body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), String> {
        if !USERNAME_PATTERN.is_match(self.username.trim()) {
            return Err(
                "Usernames must be 3-32 characters of letters, digits, '.', '_' or '-'."
                    .to_string(),
            );
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Passwords must be at least {} characters long.",
                MIN_PASSWORD_LENGTH
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BudgetForm {
    #[serde(default)]
    pub budget: String,
}

impl BudgetForm {
    pub fn validate(&self) -> Result<f64, String> {
        match self.budget.trim().parse::<f64>() {
            Ok(budget) if budget.is_finite() && budget >= 0.0 => Ok(budget),
            _ => Err("Please enter a valid non-negative budget.".to_string()),
        }
    }
}
