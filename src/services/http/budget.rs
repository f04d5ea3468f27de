use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};

use super::{sessions::FlashLevel, views, AppState, CurrentUser, SessionId};
use crate::{
    models::users::BudgetForm,
    services::{dispatch, expenses::ExpenseRequest, users::UserRequest, ServiceError},
};

pub async fn set_monthly_budget_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, ServiceError> {
    let current = dispatch(&state.user_channel, |response| UserRequest::GetUser {
        username: user.0.clone(),
        response,
    })
    .await?
    .map(|u| u.monthly_budget)
    .unwrap_or_default();

    Ok(Html(views::budget_form_page(&state.take_flashes(&session), current)))
}

pub async fn set_monthly_budget(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<BudgetForm>,
) -> Response {
    let budget = match form.validate() {
        Ok(budget) => budget,
        Err(message) => {
            log::debug!("Invalid budget from {}: {:?}", user.0, form.budget);
            state.flash(&session, FlashLevel::Error, message);
            return Redirect::to("/set_monthly_budget").into_response();
        }
    };

    let result = dispatch(&state.user_channel, |response| UserRequest::SetBudget {
        username: user.0.clone(),
        budget,
        response,
    })
    .await;

    match result {
        Ok(_) => {
            state.flash(&session, FlashLevel::Success, "Monthly budget set.");
            Redirect::to("/").into_response()
        }
        Err(e) => state.flash_or_fail(&session, e, "/set_monthly_budget"),
    }
}

pub async fn track_budget(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, ServiceError> {
    let status = dispatch(&state.expense_channel, |response| {
        ExpenseRequest::TrackBudget {
            username: user.0.clone(),
            today: chrono::Local::now().date_naive(),
            response,
        }
    })
    .await?;

    log::debug!("Budget status for {}: {}", user.0, status.message());
    Ok(Html(views::track_budget_page(&state.take_flashes(&session), &status)))
}
