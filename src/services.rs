use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::settings::Settings;

pub mod expenses;
pub mod http;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Username already exists. Please choose a different one.")]
    UsernameTaken,
    #[error("Invalid username or password. Please try again.")]
    InvalidCredentials,
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0}")]
    Communication(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Errors caused by the request itself, safe to show back to the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_)
                | ServiceError::UsernameTaken
                | ServiceError::InvalidCredentials
                | ServiceError::NotFound(_)
        )
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T>,
{
    /// Requests are handled one at a time, in arrival order, so a handler is
    /// the only writer of the files it owns.
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            handler.handle_request(request).await;
        }
    }
}

/// Sends a request built around a fresh reply channel and waits for the answer.
pub async fn dispatch<R, T, F>(channel: &mpsc::Sender<R>, build: F) -> Result<T, ServiceError>
where
    F: FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
{
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(e.to_string()))?
}

/// Starts the user and expense services plus the session housekeeping task,
/// and returns the state the HTTP layer needs to reach them.
pub fn spawn_services(settings: &Settings) -> http::AppState {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (expense_tx, mut expense_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut expense_service = expenses::ExpenseService::new();

    log::info!("Starting user service.");
    let users_path = settings.storage.users_path();
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(users_path), &mut user_rx)
            .await;
    });

    log::info!("Starting expense service.");
    let expenses_path = settings.storage.expenses_path();
    let expense_user_tx = user_tx.clone();
    tokio::spawn(async move {
        expense_service
            .run(
                expenses::ExpenseRequestHandler::new(expenses_path, expense_user_tx),
                &mut expense_rx,
            )
            .await;
    });

    let sessions = Arc::new(http::sessions::SessionStore::new(
        settings.secret_key.clone(),
        settings.session.cookie_name.clone(),
        std::time::Duration::from_secs(settings.session.timeout_minutes * 60),
        std::time::Duration::from_secs(settings.session.purge_after_minutes * 60),
    ));
    sessions.start_purge_task();

    http::AppState {
        user_channel: user_tx,
        expense_channel: expense_tx,
        sessions,
    }
}

pub async fn start_services(settings: Settings) -> Result<(), anyhow::Error> {
    let state = spawn_services(&settings);

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.server.listen, state).await
}
