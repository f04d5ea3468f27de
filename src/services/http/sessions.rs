use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Error => "error",
            FlashLevel::Info => "info",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug)]
struct Session {
    username: Option<String>,
    last_activity: Instant,
    last_seen: Instant,
    flashes: Vec<Flash>,
}

impl Session {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            username: None,
            last_activity: now,
            last_seen: now,
            flashes: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum AuthFailure {
    NotLoggedIn,
    TimedOut,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::NotLoggedIn => "You must be logged in to access this page.",
            AuthFailure::TimedOut => "Your session has timed out. Please log in again.",
        }
    }
}

/// Server-side sessions. The cookie only carries the session id and a
/// signature over it.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    secret_key: String,
    cookie_name: String,
    timeout: Duration,
    purge_after: Duration,
}

impl SessionStore {
    pub fn new(
        secret_key: String,
        cookie_name: String,
        timeout: Duration,
        purge_after: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            secret_key,
            cookie_name,
            timeout,
            purge_after,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn sign(&self, id: &str) -> String {
        let digest = Sha256::new()
            .chain_update(self.secret_key.as_bytes())
            .chain_update(b":")
            .chain_update(id.as_bytes())
            .finalize();

        digest.iter().fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
    }

    pub fn create(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(id.clone(), Session::new());
        log::debug!("Created session ({} live)", self.sessions.len());
        id
    }

    /// Maps a cookie value back to a live session id. Unsigned, tampered or
    /// forgotten ids resolve to `None`.
    pub fn resolve(&self, cookie_value: &str) -> Option<String> {
        let (id, signature) = cookie_value.split_once('.')?;
        if !signatures_match(&self.sign(id), signature) {
            return None;
        }

        let mut session = self.sessions.get_mut(id)?;
        session.last_seen = Instant::now();
        Some(id.to_string())
    }

    pub fn set_cookie_header(&self, id: &str) -> String {
        format!(
            "{}={}.{}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            id,
            self.sign(id)
        )
    }

    pub fn flash(&self, id: &str, level: FlashLevel, message: impl Into<String>) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.flashes.push(Flash {
                level,
                message: message.into(),
            });
        }
    }

    pub fn take_flashes(&self, id: &str) -> Vec<Flash> {
        self.sessions
            .get_mut(id)
            .map(|mut session| std::mem::take(&mut session.flashes))
            .unwrap_or_default()
    }

    /// Marks the user as logged in under a brand new session id, carrying
    /// over pending flashes of the previous session if there was one.
    /// Returns the new id.
    pub fn login(&self, id: Option<&str>, username: &str) -> String {
        let flashes = id
            .and_then(|id| self.sessions.remove(id))
            .map(|(_, session)| session.flashes)
            .unwrap_or_default();

        let new_id = Uuid::new_v4().simple().to_string();
        let mut session = Session::new();
        session.username = Some(username.to_string());
        session.flashes = flashes;
        self.sessions.insert(new_id.clone(), session);

        log::info!("User {} logged in", username);
        new_id
    }

    pub fn logout(&self, id: &str) -> Option<String> {
        let mut session = self.sessions.get_mut(id)?;
        let username = session.username.take();
        if let Some(username) = &username {
            log::info!("User {} logged out", username);
        }
        username
    }

    #[cfg(test)]
    pub fn username(&self, id: &str) -> Option<String> {
        self.sessions.get(id).and_then(|s| s.username.clone())
    }

    /// Returns the logged-in user and restarts the inactivity clock. A user
    /// idle for longer than the timeout is logged out.
    pub fn authorize(&self, id: &str) -> Result<String, AuthFailure> {
        let mut session = self.sessions.get_mut(id).ok_or(AuthFailure::NotLoggedIn)?;
        let Some(username) = session.username.clone() else {
            return Err(AuthFailure::NotLoggedIn);
        };

        let now = Instant::now();
        if now.duration_since(session.last_activity) > self.timeout {
            session.username = None;
            log::info!("Session for {} timed out", username);
            return Err(AuthFailure::TimedOut);
        }

        session.last_activity = now;
        Ok(username)
    }

    pub fn purge_idle(&self) -> usize {
        let before = self.sessions.len();
        let purge_after = self.purge_after;
        self.sessions
            .retain(|_, session| session.last_seen.elapsed() <= purge_after);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn start_purge_task(self: &Arc<Self>) {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));

            loop {
                interval.tick().await;

                let purged = store.purge_idle();
                if purged > 0 {
                    log::debug!(
                        "Purged {} idle session(s), {} left.",
                        purged,
                        store.len()
                    );
                }
            }
        });
    }
}

fn signatures_match(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Picks the named cookie out of a `Cookie` header value.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(timeout: Duration) -> SessionStore {
        SessionStore::new(
            "test-secret".to_string(),
            "expense_session".to_string(),
            timeout,
            Duration::from_secs(3600),
        )
    }

    fn cookie_value(store: &SessionStore, id: &str) -> String {
        let header = store.set_cookie_header(id);
        let pair = header.split(';').next().unwrap();
        pair.split_once('=').unwrap().1.to_string()
    }

    #[test]
    fn signed_cookie_resolves() {
        let store = store(Duration::from_secs(600));
        let id = store.create();

        assert_eq!(store.resolve(&cookie_value(&store, &id)), Some(id));
    }

    #[test]
    fn tampered_or_unknown_cookies_are_rejected() {
        let store = store(Duration::from_secs(600));
        let id = store.create();
        let value = cookie_value(&store, &id);

        assert_eq!(store.resolve(&id), None);
        assert_eq!(store.resolve(&format!("{}.{}", id, "0".repeat(64))), None);
        assert_eq!(store.resolve(&value.replacen(&id[..1], "z", 1)), None);

        let other = SessionStore::new(
            "other-secret".to_string(),
            "expense_session".to_string(),
            Duration::from_secs(600),
            Duration::from_secs(3600),
        );
        assert_eq!(other.resolve(&value), None);
    }

    #[test]
    fn set_cookie_attributes() {
        let store = store(Duration::from_secs(600));
        let header = store.set_cookie_header("abc");

        assert!(header.starts_with("expense_session=abc."));
        assert!(header.ends_with("; Path=/; HttpOnly; SameSite=Lax"));
    }

    #[test]
    fn flashes_are_shown_once() {
        let store = store(Duration::from_secs(600));
        let id = store.create();

        store.flash(&id, FlashLevel::Error, "first");
        store.flash(&id, FlashLevel::Info, "second");

        let flashes = store.take_flashes(&id);
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].level, FlashLevel::Error);
        assert_eq!(flashes[1].message, "second");
        assert!(store.take_flashes(&id).is_empty());
    }

    #[test]
    fn login_rotates_id_and_keeps_flashes() {
        let store = store(Duration::from_secs(600));
        let old = store.create();
        store.flash(&old, FlashLevel::Success, "Login successful.");

        let new = store.login(Some(&old), "alice");

        assert_ne!(old, new);
        assert_eq!(store.authorize(&old), Err(AuthFailure::NotLoggedIn));
        assert_eq!(store.authorize(&new), Ok("alice".to_string()));
        assert_eq!(store.take_flashes(&new).len(), 1);
    }

    #[test]
    fn anonymous_session_is_not_authorized() {
        let store = store(Duration::from_secs(600));
        let id = store.create();

        assert_eq!(store.authorize(&id), Err(AuthFailure::NotLoggedIn));
        assert_eq!(store.authorize("missing"), Err(AuthFailure::NotLoggedIn));
    }

    #[test]
    fn idle_login_times_out() {
        let store = store(Duration::ZERO);
        let id = store.login(None, "alice");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.authorize(&id), Err(AuthFailure::TimedOut));
        assert_eq!(store.username(&id), None);
        assert_eq!(store.authorize(&id), Err(AuthFailure::NotLoggedIn));
    }

    #[test]
    fn activity_keeps_the_session_alive() {
        let store = store(Duration::from_millis(200));
        let id = store.login(None, "alice");

        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(store.authorize(&id), Ok("alice".to_string()));
        }

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(store.authorize(&id), Err(AuthFailure::TimedOut));
    }

    #[test]
    fn login_without_previous_session() {
        let store = store(Duration::from_secs(600));
        let id = store.login(None, "alice");

        assert_eq!(store.len(), 1);
        assert_eq!(store.authorize(&id), Ok("alice".to_string()));
        assert!(store.take_flashes(&id).is_empty());
    }

    #[test]
    fn signature_comparison() {
        assert!(signatures_match("abcd", "abcd"));
        assert!(!signatures_match("abcd", "abce"));
        assert!(!signatures_match("abcd", "abc"));
        assert!(!signatures_match("", "a"));
    }

    #[test]
    fn logout_clears_user() {
        let store = store(Duration::from_secs(600));
        let id = store.login(None, "alice");

        assert_eq!(store.logout(&id), Some("alice".to_string()));
        assert_eq!(store.username(&id), None);
        assert_eq!(store.logout(&id), None);
    }

    #[test]
    fn purge_drops_idle_sessions() {
        let store = SessionStore::new(
            "test-secret".to_string(),
            "expense_session".to_string(),
            Duration::from_secs(600),
            Duration::ZERO,
        );
        store.create();
        store.create();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.purge_idle(), 2);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn finds_named_cookie() {
        let header = "theme=dark; expense_session=abc.def;other=1";

        assert_eq!(find_cookie(header, "expense_session"), Some("abc.def"));
        assert_eq!(find_cookie(header, "other"), Some("1"));
        assert_eq!(find_cookie(header, "missing"), None);
    }
}
