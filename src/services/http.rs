use std::sync::{Arc, OnceLock};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Router,
};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::{expenses::ExpenseRequest, users::UserRequest, ServiceError};

mod auth;
mod budget;
mod expenses;
pub mod sessions;
pub mod views;

use sessions::{AuthFailure, Flash, FlashLevel, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub user_channel: mpsc::Sender<UserRequest>,
    pub expense_channel: mpsc::Sender<ExpenseRequest>,
    pub sessions: Arc<SessionStore>,
}

/// The visitor's session, attached to every request. Visitors without a
/// cookie only get a stored session once something is written to it.
#[derive(Clone, Debug)]
pub struct SessionId(Arc<OnceLock<String>>);

impl SessionId {
    fn existing(id: String) -> Self {
        SessionId(Arc::new(OnceLock::from(id)))
    }

    fn pending() -> Self {
        SessionId(Arc::new(OnceLock::new()))
    }

    pub fn get(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }

    fn get_or_create(&self, sessions: &SessionStore) -> &str {
        self.0.get_or_init(|| sessions.create())
    }
}

/// Username of a logged-in visitor, attached to guarded routes only.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub String);

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(views::error_page(
                "The request could not be completed. Please try again later.",
            )),
        )
            .into_response()
    }
}

impl AppState {
    fn flash(&self, session: &SessionId, level: FlashLevel, message: impl Into<String>) {
        self.sessions
            .flash(session.get_or_create(&self.sessions), level, message);
    }

    fn take_flashes(&self, session: &SessionId) -> Vec<Flash> {
        session
            .get()
            .map(|id| self.sessions.take_flashes(id))
            .unwrap_or_default()
    }

    /// Flashes user-facing errors and redirects to `to`. Anything else turns
    /// into an error page.
    fn flash_or_fail(&self, session: &SessionId, error: ServiceError, to: &str) -> Response {
        if error.is_user_facing() {
            self.flash(session, FlashLevel::Error, error.to_string());
            Redirect::to(to).into_response()
        } else {
            error.into_response()
        }
    }
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => log::error!("Could not encode session cookie: {}", e),
    }
    response
}

/// Resolves the session cookie. The cookie for a new session is only sent
/// once a handler stored something in it.
async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| sessions::find_cookie(value, state.sessions.cookie_name()))
        .and_then(|value| state.sessions.resolve(value));

    let fresh = existing.is_none();
    let session = existing.map_or_else(SessionId::pending, SessionId::existing);

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    // Login hands out its own cookie for the rotated session.
    match session.get() {
        Some(id) if fresh && !response.headers().contains_key(header::SET_COOKIE) => {
            with_cookie(response, &state.sessions.set_cookie_header(id))
        }
        _ => response,
    }
}

async fn require_login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorized = session
        .get()
        .map_or(Err(AuthFailure::NotLoggedIn), |id| state.sessions.authorize(id));

    match authorized {
        Ok(username) => {
            request.extensions_mut().insert(CurrentUser(username));
            next.run(request).await
        }
        Err(failure) => {
            log::debug!("Refused {} ({:?})", request.uri().path(), failure);
            state.flash(&session, FlashLevel::Error, failure.message());
            Redirect::to("/login").into_response()
        }
    }
}

pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/", get(expenses::home))
        .route(
            "/add_expense",
            get(expenses::add_expense_form).post(expenses::add_expense),
        )
        .route("/view_expenses", get(expenses::view_expenses))
        .route(
            "/edit_expense/{id}",
            get(expenses::edit_expense_form).post(expenses::edit_expense),
        )
        .route("/delete_expense/{id}", post(expenses::delete_expense))
        .route("/save_expenses", get(expenses::save_expenses))
        .route(
            "/set_monthly_budget",
            get(budget::set_monthly_budget_form).post(budget::set_monthly_budget),
        )
        .route("/track_budget", get(budget::track_budget))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    Router::new()
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .merge(guarded)
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_http_server(listen: &str, state: AppState) -> Result<(), anyhow::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
