use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use super::{dispatch, users::UserRequest, RequestHandler, Service, ServiceError};
use crate::{
    models::{
        budget::BudgetStatus,
        expenses::{Expense, ExpenseDraft, ListedExpense},
    },
    repositories::expenses::ExpenseRepository,
};

pub enum ExpenseRequest {
    Add {
        username: String,
        draft: ExpenseDraft,
        response: oneshot::Sender<Result<Expense, ServiceError>>,
    },
    List {
        username: String,
        response: oneshot::Sender<Result<Vec<ListedExpense>, ServiceError>>,
    },
    Get {
        username: String,
        id: String,
        response: oneshot::Sender<Result<ListedExpense, ServiceError>>,
    },
    Edit {
        username: String,
        id: String,
        draft: ExpenseDraft,
        response: oneshot::Sender<Result<Expense, ServiceError>>,
    },
    Delete {
        username: String,
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    Save {
        username: String,
        response: oneshot::Sender<Result<usize, ServiceError>>,
    },
    TrackBudget {
        username: String,
        today: NaiveDate,
        response: oneshot::Sender<Result<BudgetStatus, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ExpenseRequestHandler {
    repository: ExpenseRepository,
    cache: Arc<DashMap<String, Vec<Expense>>>,
    user_channel: mpsc::Sender<UserRequest>,
}

impl ExpenseRequestHandler {
    pub fn new(path: impl Into<PathBuf>, user_channel: mpsc::Sender<UserRequest>) -> Self {
        Self {
            repository: ExpenseRepository::new(path),
            cache: Arc::new(DashMap::new()),
            user_channel,
        }
    }

    fn repository_error(e: anyhow::Error) -> ServiceError {
        log::error!("Expense storage failure: {:#}", e);
        ServiceError::Repository("Expenses".to_string(), e.to_string())
    }

    fn cached(&self, username: &str) -> Vec<Expense> {
        self.cache
            .get(username)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    fn add(&self, username: &str, draft: ExpenseDraft) -> Expense {
        let expense = Expense::new(username, draft);
        self.cache
            .entry(username.to_string())
            .or_default()
            .push(expense.clone());

        log::debug!("Cached expense {:?} for {}", expense.id, username);
        expense
    }

    fn list(&self, username: &str) -> Result<Vec<ListedExpense>, ServiceError> {
        let persisted = self
            .repository
            .list_for(username)
            .map_err(Self::repository_error)?;

        let mut listed: Vec<ListedExpense> = persisted
            .into_iter()
            .map(|expense| ListedExpense {
                expense,
                pending: false,
            })
            .chain(self.cached(username).into_iter().map(|expense| ListedExpense {
                expense,
                pending: true,
            }))
            .collect();
        listed.sort_by_key(|entry| entry.expense.date);

        Ok(listed)
    }

    fn get(&self, username: &str, id: &str) -> Result<ListedExpense, ServiceError> {
        if let Some(expense) = self.cached(username).into_iter().find(|e| e.has_id(id)) {
            return Ok(ListedExpense {
                expense,
                pending: true,
            });
        }

        self.repository
            .list_for(username)
            .map_err(Self::repository_error)?
            .into_iter()
            .find(|e| e.has_id(id))
            .map(|expense| ListedExpense {
                expense,
                pending: false,
            })
            .ok_or(ServiceError::NotFound("Expense"))
    }

    fn edit(&self, username: &str, id: &str, draft: ExpenseDraft) -> Result<Expense, ServiceError> {
        if let Some(mut entries) = self.cache.get_mut(username) {
            if let Some(expense) = entries.iter_mut().find(|e| e.has_id(id)) {
                expense.apply(draft);
                log::debug!("Edited cached expense {} for {}", id, username);
                return Ok(expense.clone());
            }
        }

        let updated = self
            .repository
            .update(username, id, draft)
            .map_err(Self::repository_error)?
            .ok_or(ServiceError::NotFound("Expense"))?;

        log::info!("Edited saved expense {} for {}", id, username);
        Ok(updated)
    }

    fn delete(&self, username: &str, id: &str) -> Result<(), ServiceError> {
        if let Some(mut entries) = self.cache.get_mut(username) {
            let before = entries.len();
            entries.retain(|e| !e.has_id(id));
            if entries.len() != before {
                log::debug!("Dropped cached expense {} for {}", id, username);
                return Ok(());
            }
        }

        if self
            .repository
            .remove(username, id)
            .map_err(Self::repository_error)?
        {
            log::info!("Deleted saved expense {} for {}", id, username);
            Ok(())
        } else {
            Err(ServiceError::NotFound("Expense"))
        }
    }

    fn save(&self, username: &str) -> Result<usize, ServiceError> {
        let Some((_, pending)) = self.cache.remove(username) else {
            return Ok(0);
        };

        if let Err(e) = self.repository.append(&pending) {
            self.cache.insert(username.to_string(), pending);
            return Err(Self::repository_error(e));
        }

        log::info!("Saved {} expense(s) for {}", pending.len(), username);
        Ok(pending.len())
    }

    async fn track_budget(
        &self,
        username: &str,
        today: NaiveDate,
    ) -> Result<BudgetStatus, ServiceError> {
        let user = dispatch(&self.user_channel, |response| UserRequest::GetUser {
            username: username.to_string(),
            response,
        })
        .await?
        .ok_or(ServiceError::NotFound("User"))?;

        let mut expenses = self
            .repository
            .list_for(username)
            .map_err(Self::repository_error)?;
        expenses.extend(self.cached(username));

        Ok(BudgetStatus::compute(user.monthly_budget, &expenses, today))
    }
}

#[async_trait]
impl RequestHandler<ExpenseRequest> for ExpenseRequestHandler {
    async fn handle_request(&self, request: ExpenseRequest) {
        match request {
            ExpenseRequest::Add {
                username,
                draft,
                response,
            } => {
                let expense = self.add(&username, draft);
                let _ = response.send(Ok(expense));
            }
            ExpenseRequest::List { username, response } => {
                let _ = response.send(self.list(&username));
            }
            ExpenseRequest::Get {
                username,
                id,
                response,
            } => {
                let _ = response.send(self.get(&username, &id));
            }
            ExpenseRequest::Edit {
                username,
                id,
                draft,
                response,
            } => {
                let _ = response.send(self.edit(&username, &id, draft));
            }
            ExpenseRequest::Delete {
                username,
                id,
                response,
            } => {
                let _ = response.send(self.delete(&username, &id));
            }
            ExpenseRequest::Save { username, response } => {
                let _ = response.send(self.save(&username));
            }
            ExpenseRequest::TrackBudget {
                username,
                today,
                response,
            } => {
                let status = self.track_budget(&username, today).await;
                let _ = response.send(status);
            }
        }
    }
}

pub struct ExpenseService;

impl ExpenseService {
    pub fn new() -> Self {
        ExpenseService {}
    }
}

#[async_trait]
impl Service<ExpenseRequest, ExpenseRequestHandler> for ExpenseService {}
