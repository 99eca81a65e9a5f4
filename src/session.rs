//! Per-browser authentication state.
//!
//! A [`Session`] is handed out when a browser shows up without a known
//! session cookie. It is kept in a [`SessionStore`] owned by the application
//! state once a form submission changes it. Sessions are ephemeral: they are
//! lost on restart and dropped after an idle period.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::store::UserRecord;

/// Session token (UUID stored in a cookie)
pub type SessionToken = String;

/// Which page an unauthenticated session should see, or that it is logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    ShowRegister,
    ShowLogin,
    Authenticated,
}

/// Authentication state of a single browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Username of the logged-in user
    pub username: Option<String>,

    /// Record of the logged-in user, as read at login time
    pub user: Option<UserRecord>,

    /// Show the login form instead of the registration form
    pub show_login: bool,
}

impl Session {
    /// Create an empty, unauthenticated session
    ///
    /// # Returns
    /// * `Session` - A session that shows the registration form
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a user has logged in on this session
    ///
    /// # Returns
    /// * `bool` - True once both the username and the user record are set
    pub fn is_authenticated(&self) -> bool {
        self.username.is_some() && self.user.is_some()
    }

    /// Work out which page this session should see
    ///
    /// # Returns
    /// * `AuthState` - `Authenticated` for a logged-in session, otherwise the
    ///   form selected by `show_login`
    pub fn state(&self) -> AuthState {
        if self.is_authenticated() {
            AuthState::Authenticated
        } else if self.show_login {
            AuthState::ShowLogin
        } else {
            AuthState::ShowRegister
        }
    }
}

struct Entry {
    session: Session,
    last_seen: Instant,
}

/// In-memory session storage keyed by token.
///
/// Clones share the same map.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionToken, Entry>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty session store
    ///
    /// # Arguments
    /// * `ttl` - How long a session may go unused before it is dropped
    ///
    /// # Returns
    /// * `SessionStore` - A store with no sessions
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Look up the session for a token
    ///
    /// A fresh session is handed out under a new token when the token is
    /// missing, unknown or expired. Fresh sessions are not stored until
    /// `save` is called, so requests that change nothing leave no trace.
    ///
    /// # Arguments
    /// * `token` - The session token from the cookie, if any
    ///
    /// # Returns
    /// * `(SessionToken, Session)` - The token to keep using and its session
    pub fn open(&self, token: Option<&str>) -> (SessionToken, Session) {
        if let Some(token) = token {
            let now = Instant::now();
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

            let expired = match sessions.get_mut(token) {
                Some(entry) if now.duration_since(entry.last_seen) < self.ttl => {
                    entry.last_seen = now;
                    return (token.to_string(), entry.session.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                sessions.remove(token);
                log::debug!("session expired ({} active)", sessions.len());
            }
        }

        (Uuid::new_v4().to_string(), Session::new())
    }

    /// Store the state of a session
    ///
    /// Expired sessions are dropped at the same time.
    ///
    /// # Arguments
    /// * `token` - The session token
    /// * `session` - The session state to keep
    pub fn save(&self, token: &str, session: Session) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        // Prune before inserting so the map only holds live sessions
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);
        sessions.insert(
            token.to_string(),
            Entry {
                session,
                last_seen: now,
            },
        );
    }

    /// Destroy a session
    ///
    /// # Arguments
    /// * `token` - The session token to forget
    pub fn remove(&self, token: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(token);
    }

    /// Get the number of stored sessions
    ///
    /// # Returns
    /// * `usize` - Sessions held, expired ones included until the next `save`
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether no sessions are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GrantType;

    fn logged_in() -> Session {
        Session {
            username: Some("ana".to_string()),
            user: Some(UserRecord {
                full_name: "Ana Silva".to_string(),
                grant_type: GrantType::Mestrado,
                password: "1234".to_string(),
                created_at: "2024-01-01 00:00:00".to_string(),
            }),
            show_login: true,
        }
    }

    #[test]
    fn new_session_shows_registration() {
        let session = Session::new();
        assert_eq!(session.state(), AuthState::ShowRegister);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn state_follows_flag_and_user() {
        let mut session = Session::new();
        session.show_login = true;
        assert_eq!(session.state(), AuthState::ShowLogin);
        assert_eq!(logged_in().state(), AuthState::Authenticated);
    }

    #[test]
    fn unknown_token_gets_a_fresh_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (token, session) = store.open(Some("not-a-session"));
        assert_ne!(token, "not-a-session");
        assert_eq!(session, Session::new());
        assert!(store.is_empty());
    }

    #[test]
    fn saved_state_is_returned_for_same_token() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (token, _) = store.open(None);
        store.save(&token, logged_in());

        let (again, session) = store.open(Some(&token));
        assert_eq!(again, token);
        assert_eq!(session, logged_in());
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (first, _) = store.open(None);
        let (second, _) = store.open(None);
        store.save(&first, logged_in());

        let (_, other) = store.open(Some(&second));
        assert!(!other.is_authenticated());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let (token, _) = store.open(None);
        store.save(&token, logged_in());

        let (fresh, session) = store.open(Some(&token));
        assert_ne!(fresh, token);
        assert!(!session.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn opening_without_saving_stores_nothing() {
        let store = SessionStore::new(Duration::from_secs(60));
        for _ in 0..100 {
            store.open(None);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn save_drops_expired_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        store.save("first", Session::new());
        store.save("second", Session::new());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_forgets_the_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (token, _) = store.open(None);
        store.save(&token, Session::new());
        assert_eq!(store.len(), 1);

        store.remove(&token);
        assert!(store.is_empty());
    }
}
