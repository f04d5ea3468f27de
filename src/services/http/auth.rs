use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};

use super::{sessions::FlashLevel, views, with_cookie, AppState, SessionId};
use crate::{
    models::users::Credentials,
    services::{dispatch, users::UserRequest},
};

pub async fn register_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Html<String> {
    log::debug!("Rendering register form");
    Html(views::register_page(&state.take_flashes(&session)))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Form(credentials): Form<Credentials>,
) -> Response {
    let result = dispatch(&state.user_channel, |response| UserRequest::Register {
        credentials,
        response,
    })
    .await;

    match result {
        Ok(user) => {
            log::debug!("Registration successful for {}", user.username);
            state.flash(
                &session,
                FlashLevel::Success,
                "Registration successful. You can now log in.",
            );
            Redirect::to("/login").into_response()
        }
        Err(e) => state.flash_or_fail(&session, e, "/register"),
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Html<String> {
    log::debug!("Rendering login form");
    Html(views::login_page(&state.take_flashes(&session)))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Form(credentials): Form<Credentials>,
) -> Response {
    let result = dispatch(&state.user_channel, |response| UserRequest::Authenticate {
        credentials,
        response,
    })
    .await;

    match result {
        Ok(user) => {
            let new_id = state.sessions.login(session.get(), &user.username);
            state
                .sessions
                .flash(&new_id, FlashLevel::Success, "Login successful.");
            with_cookie(
                Redirect::to("/").into_response(),
                &state.sessions.set_cookie_header(&new_id),
            )
        }
        Err(e) => state.flash_or_fail(&session, e, "/login"),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Redirect {
    if let Some(id) = session.get() {
        state.sessions.logout(id);
    }
    state.flash(&session, FlashLevel::Info, "You have been logged out.");
    Redirect::to("/login")
}
