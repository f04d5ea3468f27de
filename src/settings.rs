use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub data_dir: String,
    pub users_file: String,
    pub expenses_file: String,
}

impl Storage {
    pub fn users_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.users_file)
    }

    pub fn expenses_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.expenses_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub cookie_name: String,
    pub timeout_minutes: u64,
    pub purge_after_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub storage: Storage,
    pub session: Session,
    pub secret_key: String,
}

impl Settings {
    /// Defaults, then the optional TOML file at `path`, then `EXPENSES__*`
    /// variables. The secret key only ever comes from `SECRET_KEY`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::build(
            path,
            Environment::with_prefix("EXPENSES").separator("__"),
            std::env::var("SECRET_KEY").ok(),
        )
    }

    fn build(
        path: &str,
        environment: Environment,
        secret_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.listen", "0.0.0.0:5001")?
            .set_default("storage.data_dir", "data")?
            .set_default("storage.users_file", "users.json")?
            .set_default("storage.expenses_file", "expenses.csv")?
            .set_default("session.cookie_name", "expense_session")?
            .set_default("session.timeout_minutes", 10)?
            .set_default("session.purge_after_minutes", 60)?
            .add_source(File::with_name(path).required(false))
            .add_source(environment)
            .set_override_option("secret_key", secret_key)?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        if settings.secret_key.trim().is_empty() {
            return Err(ConfigError::Message("SECRET_KEY must not be empty".to_string()));
        }

        Ok(settings)
    }
}
