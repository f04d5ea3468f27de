use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;

use super::files;
use crate::models::users;

/// Users are kept as one JSON object keyed by username.
#[derive(Clone)]
pub struct UserRepository {
    path: PathBuf,
}

impl UserRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> Result<BTreeMap<String, users::User>, anyhow::Error> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let users = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        Ok(users)
    }

    pub fn get(&self, username: &str) -> Result<Option<users::User>, anyhow::Error> {
        Ok(self.load_all()?.remove(username))
    }

    /// Returns `false` without writing when the username is taken.
    pub fn insert(&self, user: users::User) -> Result<bool, anyhow::Error> {
        let mut all = self.load_all()?;
        if all.contains_key(&user.username) {
            return Ok(false);
        }

        all.insert(user.username.clone(), user);
        self.save_all(&all)?;

        Ok(true)
    }

    pub fn set_budget(
        &self,
        username: &str,
        budget: f64,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let mut all = self.load_all()?;
        let Some(user) = all.get_mut(username) else {
            return Ok(None);
        };

        user.monthly_budget = budget;
        let updated = user.clone();
        self.save_all(&all)?;

        Ok(Some(updated))
    }

    fn save_all(&self, users: &BTreeMap<String, users::User>) -> Result<(), anyhow::Error> {
        files::write_atomic(&self.path, |writer| {
            serde_json::to_writer_pretty(writer, users).context("Failed to serialize users")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, UserRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = UserRepository::new(temp_dir.path().join("users.json"));
        (temp_dir, repo)
    }

    fn user(name: &str) -> users::User {
        users::User {
            username: name.to_string(),
            password_hash: format!("hash-of-{}", name),
            monthly_budget: 0.0,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let (_temp_dir, repo) = create_test_repo();
        assert!(repo.load_all().unwrap().is_empty());
        assert_eq!(repo.get("alice").unwrap(), None);
    }

    #[test]
    fn insert_and_get() {
        let (_temp_dir, repo) = create_test_repo();

        assert!(repo.insert(user("alice")).unwrap());
        assert!(repo.insert(user("bob")).unwrap());

        assert_eq!(repo.get("alice").unwrap(), Some(user("alice")));
        assert_eq!(repo.load_all().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (_temp_dir, repo) = create_test_repo();
        assert!(repo.insert(user("alice")).unwrap());

        let mut again = user("alice");
        again.password_hash = "other".to_string();
        assert!(!repo.insert(again).unwrap());

        assert_eq!(repo.get("alice").unwrap().unwrap().password_hash, "hash-of-alice");
    }

    #[test]
    fn set_budget_persists() {
        let (temp_dir, repo) = create_test_repo();
        repo.insert(user("alice")).unwrap();

        let updated = repo.set_budget("alice", 300.0).unwrap().unwrap();
        assert_eq!(updated.monthly_budget, 300.0);

        let reopened = UserRepository::new(temp_dir.path().join("users.json"));
        assert_eq!(reopened.get("alice").unwrap().unwrap().monthly_budget, 300.0);
    }

    #[test]
    fn set_budget_for_unknown_user() {
        let (_temp_dir, repo) = create_test_repo();
        assert_eq!(repo.set_budget("ghost", 10.0).unwrap(), None);
        assert!(!repo.path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let (temp_dir, repo) = create_test_repo();
        std::fs::write(temp_dir.path().join("users.json"), "not json").unwrap();

        let err = repo.load_all().unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
