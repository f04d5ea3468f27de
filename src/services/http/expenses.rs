use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};

use super::{sessions::FlashLevel, views, AppState, CurrentUser, SessionId};
use crate::{
    models::expenses::ExpenseForm,
    services::{dispatch, expenses::ExpenseRequest, ServiceError},
};

pub async fn home(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
) -> Html<String> {
    log::debug!("Rendering home for {}", user.0);
    Html(views::home_page(&state.take_flashes(&session), &user.0))
}

pub async fn add_expense_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Html<String> {
    Html(views::expense_form_page(
        &state.take_flashes(&session),
        "Add expense",
        "/add_expense",
        &ExpenseForm::default(),
        None,
    ))
}

pub async fn add_expense(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ExpenseForm>,
) -> Response {
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(message) => {
            log::debug!("Invalid expense input from {}: {}", user.0, message);
            state.flash(&session, FlashLevel::Error, message.clone());
            return Html(views::expense_form_page(
                &state.take_flashes(&session),
                "Add expense",
                "/add_expense",
                &form,
                Some(&message),
            ))
            .into_response();
        }
    };

    let result = dispatch(&state.expense_channel, |response| ExpenseRequest::Add {
        username: user.0.clone(),
        draft,
        response,
    })
    .await;

    match result {
        Ok(_) => {
            state.flash(&session, FlashLevel::Success, "Expense added.");
            Redirect::to("/").into_response()
        }
        Err(e) => state.flash_or_fail(&session, e, "/add_expense"),
    }
}

pub async fn view_expenses(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, ServiceError> {
    let expenses = dispatch(&state.expense_channel, |response| ExpenseRequest::List {
        username: user.0.clone(),
        response,
    })
    .await?;

    log::debug!("Listing {} expense(s) for {}", expenses.len(), user.0);
    Ok(Html(views::expenses_page(&state.take_flashes(&session), &expenses)))
}

pub async fn edit_expense_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    let result = dispatch(&state.expense_channel, |response| ExpenseRequest::Get {
        username: user.0.clone(),
        id: id.clone(),
        response,
    })
    .await;

    match result {
        Ok(entry) => Html(views::expense_form_page(
            &state.take_flashes(&session),
            "Edit expense",
            &format!("/edit_expense/{}", id),
            &ExpenseForm::from(&entry.expense),
            None,
        ))
        .into_response(),
        Err(e) => state.flash_or_fail(&session, e, "/view_expenses"),
    }
}

pub async fn edit_expense(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Form(form): Form<ExpenseForm>,
) -> Response {
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(message) => {
            state.flash(&session, FlashLevel::Error, message.clone());
            return Html(views::expense_form_page(
                &state.take_flashes(&session),
                "Edit expense",
                &format!("/edit_expense/{}", id),
                &form,
                Some(&message),
            ))
            .into_response();
        }
    };

    let result = dispatch(&state.expense_channel, |response| ExpenseRequest::Edit {
        username: user.0.clone(),
        id,
        draft,
        response,
    })
    .await;

    match result {
        Ok(_) => {
            state.flash(&session, FlashLevel::Success, "Expense updated.");
            Redirect::to("/view_expenses").into_response()
        }
        Err(e) => state.flash_or_fail(&session, e, "/view_expenses"),
    }
}

pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    let result = dispatch(&state.expense_channel, |response| ExpenseRequest::Delete {
        username: user.0.clone(),
        id,
        response,
    })
    .await;

    match result {
        Ok(()) => {
            state.flash(&session, FlashLevel::Success, "Expense deleted.");
            Redirect::to("/view_expenses").into_response()
        }
        Err(e) => state.flash_or_fail(&session, e, "/view_expenses"),
    }
}

pub async fn save_expenses(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Redirect, ServiceError> {
    let saved = dispatch(&state.expense_channel, |response| ExpenseRequest::Save {
        username: user.0.clone(),
        response,
    })
    .await?;

    state.flash(
        &session,
        FlashLevel::Success,
        format!("Saved {} expense(s).", saved),
    );
    Ok(Redirect::to("/"))
}
