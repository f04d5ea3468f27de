use std::fmt::Write as _;

use super::sessions::Flash;
use crate::models::{budget::BudgetStatus, expenses::ExpenseForm, expenses::ListedExpense};

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, flashes: &[Flash], body: &str) -> String {
    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(
            messages,
            r#"<li class="flash {}">{}</li>"#,
            flash.level.as_str(),
            escape(&flash.message)
        );
    }
    if !messages.is_empty() {
        messages = format!(r#"<ul class="flashes">{}</ul>"#, messages);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Expense Tracker</title>
</head>
<body>
<header><a href="/">Expense Tracker</a></header>
<main>
<h1>{title}</h1>
{messages}
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        messages = messages,
        body = body
    )
}

fn credentials_form(action: &str, submit: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
<label>Username <input type="text" name="username" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">{submit}</button>
</form>"#
    )
}

pub fn register_page(flashes: &[Flash]) -> String {
    let body = format!(
        r#"{}
<p>Already registered? <a href="/login">Log in</a></p>"#,
        credentials_form("/register", "Register")
    );
    layout("Register", flashes, &body)
}

pub fn login_page(flashes: &[Flash]) -> String {
    let body = format!(
        r#"{}
<p>No account yet? <a href="/register">Register</a></p>"#,
        credentials_form("/login", "Log in")
    );
    layout("Log in", flashes, &body)
}

pub fn home_page(flashes: &[Flash], username: &str) -> String {
    let body = format!(
        r#"<p>Signed in as <strong>{}</strong>.</p>
<ol class="menu">
<li><a href="/add_expense">Add expense</a></li>
<li><a href="/view_expenses">View expenses</a></li>
<li><a href="/set_monthly_budget">Set monthly budget</a></li>
<li><a href="/track_budget">Track budget</a></li>
<li><a href="/save_expenses">Save expenses</a></li>
<li><a href="/logout">Log out</a></li>
</ol>"#,
        escape(username)
    );
    layout("Home", flashes, &body)
}

/// Shared add/edit form. `error` repeats the validation failure inline.
pub fn expense_form_page(
    flashes: &[Flash],
    title: &str,
    action: &str,
    form: &ExpenseForm,
    error: Option<&str>,
) -> String {
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default();

    let body = format!(
        r#"{error}<form method="post" action="{action}">
<label>Date <input type="date" name="date" value="{date}" placeholder="YYYY-MM-DD" required></label>
<label>Category <input type="text" name="category" value="{category}" required></label>
<label>Amount <input type="number" name="amount" value="{amount}" step="0.01" min="0.01" required></label>
<label>Description <input type="text" name="description" value="{description}"></label>
<button type="submit">Save</button>
</form>
<p><a href="/">Back to home</a></p>"#,
        error = error,
        action = escape(action),
        date = escape(&form.date),
        category = escape(&form.category),
        amount = escape(&form.amount),
        description = escape(&form.description),
    );
    layout(title, flashes, &body)
}

pub fn expenses_page(flashes: &[Flash], expenses: &[ListedExpense]) -> String {
    if expenses.is_empty() {
        let body = r#"<p>No expenses recorded yet.</p>
<p><a href="/add_expense">Add expense</a> | <a href="/">Back to home</a></p>"#;
        return layout("Expenses", flashes, body);
    }

    let mut rows = String::new();
    for entry in expenses {
        let expense = &entry.expense;
        let actions = match &expense.id {
            Some(id) => {
                let id = escape(id);
                format!(
                    r#"<a href="/edit_expense/{id}">Edit</a>
<form method="post" action="/delete_expense/{id}" class="inline"><button type="submit">Delete</button></form>"#
                )
            }
            None => String::new(),
        };
        let state = if entry.pending { "Unsaved" } else { "Saved" };

        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            expense.date.format("%Y-%m-%d"),
            escape(&expense.category),
            expense.amount,
            escape(&expense.description),
            state,
            actions
        );
    }

    let total: f64 = expenses.iter().map(|e| e.expense.amount).sum();
    let body = format!(
        r#"<table>
<thead><tr><th>Date</th><th>Category</th><th>Amount</th><th>Description</th><th>Status</th><th></th></tr></thead>
<tbody>
{rows}</tbody>
<tfoot><tr><td colspan="2">Total</td><td>{total:.2}</td><td colspan="3"></td></tr></tfoot>
</table>
<p><a href="/save_expenses">Save expenses</a> | <a href="/">Back to home</a></p>"#
    );
    layout("Expenses", flashes, &body)
}

pub fn budget_form_page(flashes: &[Flash], current: f64) -> String {
    let body = format!(
        r#"<form method="post" action="/set_monthly_budget">
<label>Monthly budget <input type="number" name="budget" value="{current:.2}" step="0.01" min="0" required></label>
<button type="submit">Set budget</button>
</form>
<p><a href="/">Back to home</a></p>"#
    );
    layout("Monthly budget", flashes, &body)
}

pub fn track_budget_page(flashes: &[Flash], status: &BudgetStatus) -> String {
    let body = format!(
        r#"<dl>
<dt>Month</dt><dd>{year:04}-{month:02}</dd>
<dt>Budget</dt><dd>{budget:.2}</dd>
<dt>Spent</dt><dd>{spent:.2}</dd>
</dl>
<p class="status{class}">{message}</p>
<p><a href="/">Back to home</a></p>"#,
        year = status.year,
        month = status.month,
        budget = status.budget,
        spent = status.spent,
        class = if status.exceeded() { " exceeded" } else { "" },
        message = escape(&status.message()),
    );
    layout("Budget status", flashes, &body)
}

pub fn error_page(message: &str) -> String {
    let body = format!(
        r#"<p class="error">{}</p>
<p><a href="/">Back to home</a></p>"#,
        escape(message)
    );
    layout("Something went wrong", &[], &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::expenses::Expense;
    use crate::services::http::sessions::FlashLevel;
    use chrono::NaiveDate;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn flashes_are_rendered_escaped() {
        let flashes = vec![Flash {
            level: FlashLevel::Error,
            message: "<oops>".to_string(),
        }];

        let page = login_page(&flashes);
        assert!(page.contains(r#"<li class="flash error">&lt;oops&gt;</li>"#));
    }

    #[test]
    fn expense_rows_show_controls_only_with_id() {
        let expense = Expense {
            id: Some("abc".to_string()),
            username: "alice".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            category: "Food".to_string(),
            amount: 12.5,
            description: "<lunch>".to_string(),
        };
        let mut legacy = expense.clone();
        legacy.id = None;

        let page = expenses_page(
            &[],
            &[
                ListedExpense {
                    expense,
                    pending: true,
                },
                ListedExpense {
                    expense: legacy,
                    pending: false,
                },
            ],
        );

        assert_eq!(page.matches("/edit_expense/").count(), 1);
        assert!(page.contains(r#"action="/delete_expense/abc""#));
        assert!(page.contains("&lt;lunch&gt;"));
        assert!(page.contains("Unsaved"));
        assert!(page.contains("<td>25.00</td>"));
    }
}
