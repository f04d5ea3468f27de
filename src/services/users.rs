use std::path::PathBuf;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::users::{self, Credentials},
    repositories::users::UserRepository,
};

pub enum UserRequest {
    Register {
        credentials: Credentials,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    Authenticate {
        credentials: Credentials,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    GetUser {
        username: String,
        response: oneshot::Sender<Result<Option<users::User>, ServiceError>>,
    },
    SetBudget {
        username: String,
        budget: f64,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
}

impl UserRequestHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let repository = UserRepository::new(path);

        UserRequestHandler { repository }
    }

    fn repository_error(e: anyhow::Error) -> ServiceError {
        log::error!("User storage failure: {:#}", e);
        ServiceError::Repository("Users".to_string(), e.to_string())
    }

    async fn register(&self, credentials: Credentials) -> Result<users::User, ServiceError> {
        credentials.validate().map_err(ServiceError::Validation)?;
        let username = credentials.username.trim().to_string();

        if self
            .repository
            .get(&username)
            .map_err(Self::repository_error)?
            .is_some()
        {
            log::debug!("Registration refused, {} already exists", username);
            return Err(ServiceError::UsernameTaken);
        }

        let password = credentials.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))??;

        let user = users::User {
            username,
            password_hash,
            monthly_budget: 0.0,
        };

        if !self
            .repository
            .insert(user.clone())
            .map_err(Self::repository_error)?
        {
            return Err(ServiceError::UsernameTaken);
        }

        log::info!("Registered user {}", user.username);
        Ok(user)
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<users::User, ServiceError> {
        let username = credentials.username.trim();
        let Some(user) = self
            .repository
            .get(username)
            .map_err(Self::repository_error)?
        else {
            log::debug!("Login refused, unknown user {}", username);
            return Err(ServiceError::InvalidCredentials);
        };

        let password = credentials.password;
        let password_hash = user.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;

        if !verified {
            log::debug!("Login refused, wrong password for {}", user.username);
            return Err(ServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    fn get_user(&self, username: &str) -> Result<Option<users::User>, ServiceError> {
        self.repository
            .get(username)
            .map_err(Self::repository_error)
    }

    fn set_budget(&self, username: &str, budget: f64) -> Result<users::User, ServiceError> {
        if !budget.is_finite() || budget < 0.0 {
            return Err(ServiceError::Validation(
                "Please enter a valid non-negative budget.".to_string(),
            ));
        }

        let user = self
            .repository
            .set_budget(username, budget)
            .map_err(Self::repository_error)?
            .ok_or(ServiceError::NotFound("User"))?;

        log::info!("Monthly budget for {} set to {:.2}", username, budget);
        Ok(user)
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register {
                credentials,
                response,
            } => {
                let user = self.register(credentials).await;
                let _ = response.send(user);
            }
            UserRequest::Authenticate {
                credentials,
                response,
            } => {
                let user = self.authenticate(credentials).await;
                let _ = response.send(user);
            }
            UserRequest::GetUser { username, response } => {
                let user = self.get_user(&username);
                let _ = response.send(user);
            }
            UserRequest::SetBudget {
                username,
                budget,
                response,
            } => {
                let user = self.set_budget(&username, budget);
                let _ = response.send(user);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
