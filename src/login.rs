#[cfg(feature = "web")]
use crate::app::{AppState, SESSION_COOKIE};
#[cfg(feature = "web")]
use crate::messages::Notice;
use crate::password::PasswordScheme;
use crate::session::Session;
#[cfg(feature = "web")]
use crate::session::SessionToken;
use crate::store::{GrantType, StoreError, UserRecord, UserStore};
#[cfg(feature = "web")]
use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
#[cfg(feature = "web")]
use std::sync::Arc;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Timestamp format of `UserRecord::created_at`
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Registration form data
///
/// Used to receive the registration form from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationForm {
    /// Display name of the new user
    pub full_name: String,

    /// Grant type, sent as its label
    pub grant_type: GrantType,

    /// Username (unique identifier for the user)
    pub username: String,

    /// Password as typed
    pub password: String,
}

/// Login form data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already exists: {username}")]
    DuplicateUsername { username: String },

    /// Unknown username and wrong password are deliberately the same error.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("required field is empty: {field}")]
    MissingField { field: &'static str },

    #[error("password hashing failed: {reason}")]
    Hash { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registration and login against a [`UserStore`].
///
/// Registrations run one at a time inside a process, so two concurrent
/// sign-ups cannot overwrite each other's load-modify-save. Another process
/// writing the same file still wins or loses by whoever saves last.
#[derive(Debug)]
pub struct Authenticator {
    store: UserStore,
    scheme: PasswordScheme,
    write_lock: Mutex<()>,
}

impl Authenticator {
    /// Create an authenticator
    ///
    /// # Arguments
    /// * `store` - The users file to register into and log in against
    /// * `scheme` - How passwords are stored and checked
    ///
    /// # Returns
    /// * `Authenticator` - A new authenticator
    pub fn new(store: UserStore, scheme: PasswordScheme) -> Self {
        Authenticator {
            store,
            scheme,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the underlying user store
    ///
    /// # Returns
    /// * `&UserStore` - The store this authenticator uses
    pub fn store(&self) -> &UserStore {
        &self.store
    }

    /// Register a new user
    ///
    /// Creates a new account from the registration form and moves the session
    /// to the login form. The new user is not logged in.
    ///
    /// # Arguments
    /// * `session` - The session that submitted the form
    /// * `form` - Full name, grant type, username and password
    ///
    /// # Returns
    /// * `Result<(), AuthError>` - Success or the reason registration failed
    ///
    /// # Errors
    /// * Returns `MissingField` if the name, username or password is empty
    /// * Returns `DuplicateUsername` if the username is taken; nothing is written
    /// * Returns `Store` if the users file cannot be read or written; the
    ///   session is left as it was
    pub fn register(
        &self,
        session: &mut Session,
        form: RegistrationForm,
    ) -> Result<(), AuthError> {
        for (field, value) in [
            ("full_name", &form.full_name),
            ("username", &form.username),
            ("password", &form.password),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::MissingField { field });
            }
        }

        // Hold the lock across load, check and save
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut users = self.store.load_all()?;
        if users.contains_key(&form.username) {
            log::info!("registration refused, username {:?} exists", form.username);
            return Err(AuthError::DuplicateUsername {
                username: form.username,
            });
        }

        let password = self
            .scheme
            .encode(&form.password)
            .map_err(|reason| AuthError::Hash { reason })?;
        let record = UserRecord {
            full_name: form.full_name,
            grant_type: form.grant_type,
            password,
            created_at: chrono::Local::now().format(CREATED_AT_FORMAT).to_string(),
        };

        users.insert(form.username.clone(), record);
        self.store.save_all(&users)?;

        log::info!("registered user {:?}", form.username);
        session.show_login = true;
        Ok(())
    }

    /// Verify user credentials
    ///
    /// Checks the username and password against the users file and marks the
    /// session as logged in when they match.
    ///
    /// # Arguments
    /// * `session` - The session that submitted the form
    /// * `form` - Username and password
    ///
    /// # Returns
    /// * `Result<&UserRecord, AuthError>` - The logged-in user's record, or an error
    ///
    /// # Errors
    /// * Returns `InvalidCredentials` for an unknown user or a wrong password
    /// * Returns `Store` if the users file cannot be read
    pub fn login<'s>(
        &self,
        session: &'s mut Session,
        form: LoginForm,
    ) -> Result<&'s UserRecord, AuthError> {
        let mut users = self.store.load_all()?;

        let matched = users
            .get(&form.username)
            .is_some_and(|user| self.scheme.verify(&form.password, &user.password));
        let record = match users.remove(&form.username) {
            Some(record) if matched => record,
            _ => {
                log::info!("failed login for {:?}", form.username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        log::info!("user {:?} logged in", form.username);
        session.username = Some(form.username);
        Ok(session.user.insert(record))
    }

    /// Log the user out
    ///
    /// Forgets the logged-in user; the session goes back to the login form.
    ///
    /// # Arguments
    /// * `session` - The session to clear
    pub fn logout(&self, session: &mut Session) {
        if let Some(username) = session.username.take() {
            log::info!("user {:?} logged out", username);
        }
        session.user = None;
        session.show_login = true;
    }

    /// Switch an unauthenticated session to the login form
    pub fn show_login(&self, session: &mut Session) {
        session.show_login = true;
    }

    /// Switch an unauthenticated session to the registration form
    pub fn show_register(&self, session: &mut Session) {
        session.show_login = false;
    }
}

// Web handler functions below (only compiled with "web" feature)

/// Look up the caller's session
///
/// # Arguments
/// * `state` - Application state holding the session store
/// * `jar` - Cookie jar carrying the session cookie, if any
///
/// # Returns
/// * `(SessionToken, Session)` - The session token and its state; a fresh
///   session under a new token when the cookie is missing or stale
#[cfg(feature = "web")]
pub fn session_from_jar(state: &AppState, jar: &CookieJar) -> (SessionToken, Session) {
    let presented = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    state.sessions.open(presented.as_deref())
}

/// Keep a session that a form submission changed
///
/// A brand-new session that is still in its initial state is not stored and
/// gets no cookie.
///
/// # Arguments
/// * `state` - Application state holding the session store
/// * `jar` - Cookie jar of the request
/// * `token` - The session token returned by `session_from_jar`
/// * `session` - The updated session
///
/// # Returns
/// * `CookieJar` - The jar, with a session cookie added if the token is new
#[cfg(feature = "web")]
pub fn save_session(
    state: &AppState,
    jar: CookieJar,
    token: &str,
    session: Session,
) -> CookieJar {
    let is_known = jar.get(SESSION_COOKIE).is_some_and(|c| c.value() == token);
    if !is_known && session == Session::new() {
        return jar;
    }

    state.sessions.save(token, session);
    if is_known {
        return jar;
    }

    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_http_only(true);
    cookie.set_path("/");
    jar.add(cookie)
}

/// Render the form the session should currently see.
#[cfg(feature = "web")]
pub(crate) fn form_page(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    notice: Option<&Notice>,
) -> Response {
    let rendered = if session.show_login {
        state.pages.login_page(notice)
    } else {
        state.pages.register_page(notice)
    };

    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            log::error!("failed to render form: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

#[cfg(feature = "web")]
fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::DuplicateUsername { .. } => StatusCode::CONFLICT,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::MissingField { .. } => StatusCode::BAD_REQUEST,
        AuthError::Hash { .. } | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve the entry page
///
/// Shows the registration or login form, or sends a logged-in user to the
/// dashboard.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Cookie jar containing the session cookie
///
/// # Returns
/// * `Response` - The form page or a redirect to `/dashboard`
#[cfg(feature = "web")]
pub async fn serve_entry_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (_, session) = session_from_jar(&state, &jar);

    if session.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }
    form_page(&state, &session, StatusCode::OK, None)
}

/// Handle user registration
///
/// Processes registration form submissions and creates a new user account.
/// A form that cannot be decoded is answered with the registration form
/// again.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Cookie jar for the session cookie
/// * `form` - Form data containing the name, grant type, username and password
///
/// # Returns
/// * `Response` - Login form on success, registration form with a notice otherwise
#[cfg(feature = "web")]
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    form: Result<Form<RegistrationForm>, FormRejection>,
) -> Response {
    let (token, mut session) = session_from_jar(&state, &jar);

    if session.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }

    // A registration submission always comes from the registration form
    state.authenticator.show_register(&mut session);

    let page = match form {
        Err(rejection) => {
            log::debug!("rejected registration form: {}", rejection);
            form_page(
                &state,
                &session,
                StatusCode::BAD_REQUEST,
                Some(&Notice::MissingField),
            )
        }
        Ok(Form(form)) => match state.authenticator.register(&mut session, form) {
            Ok(()) => form_page(
                &state,
                &session,
                StatusCode::OK,
                Some(&Notice::RegistrationSuccess),
            ),
            Err(e) => {
                if matches!(e, AuthError::Store(_) | AuthError::Hash { .. }) {
                    log::error!("registration failed: {}", e);
                }
                form_page(&state, &session, status_for(&e), Some(&Notice::from(&e)))
            }
        },
    };

    let jar = save_session(&state, jar, &token, session);
    (jar, page).into_response()
}

/// Handle user login requests
///
/// Processes login form submissions, validates credentials, and marks the
/// session as logged in if valid.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Cookie jar for the session cookie
/// * `form` - Form data containing the username and password
///
/// # Returns
/// * `Response` - Redirect to the dashboard if successful, or the login form
///   with an error notice
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let (token, mut session) = session_from_jar(&state, &jar);

    if session.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }

    // A login submission always comes from the login form
    state.authenticator.show_login(&mut session);

    let page = match form {
        Err(rejection) => {
            log::debug!("rejected login form: {}", rejection);
            form_page(
                &state,
                &session,
                StatusCode::BAD_REQUEST,
                Some(&Notice::MissingField),
            )
        }
        Ok(Form(form)) => match state.authenticator.login(&mut session, form) {
            Ok(_) => Redirect::to("/dashboard").into_response(),
            Err(e) => {
                if let AuthError::Store(store_err) = &e {
                    log::error!("login failed: {}", store_err);
                }
                form_page(&state, &session, status_for(&e), Some(&Notice::from(&e)))
            }
        },
    };

    let jar = save_session(&state, jar, &token, session);
    (jar, page).into_response()
}

/// Switch to the login form
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Cookie jar for the session cookie
///
/// # Returns
/// * `Response` - Redirect back to the entry page
#[cfg(feature = "web")]
pub async fn handle_show_login(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (token, mut session) = session_from_jar(&state, &jar);
    state.authenticator.show_login(&mut session);
    let jar = save_session(&state, jar, &token, session);
    (jar, Redirect::to("/")).into_response()
}

/// Switch to the registration form
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Cookie jar for the session cookie
///
/// # Returns
/// * `Response` - Redirect back to the entry page
#[cfg(feature = "web")]
pub async fn handle_show_register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Response {
    let (token, mut session) = session_from_jar(&state, &jar);
    state.authenticator.show_register(&mut session);
    let jar = save_session(&state, jar, &token, session);
    (jar, Redirect::to("/")).into_response()
}

/// Handle user logout
///
/// Clears the logged-in user, destroys the old session and continues on the
/// login form under a new session token.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Cookie jar containing the session cookie
///
/// # Returns
/// * `Response` - Modified cookie jar and redirect to the entry page
#[cfg(feature = "web")]
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (token, mut session) = session_from_jar(&state, &jar);
    state.authenticator.logout(&mut session);

    // Never reuse a token that was logged in
    state.sessions.remove(&token);
    let (fresh, _) = state.sessions.open(None);

    let jar = save_session(&state, jar, &fresh, session);
    (jar, Redirect::to("/")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthState;
    use tempfile::TempDir;

    fn authenticator(dir: &TempDir, scheme: PasswordScheme) -> Authenticator {
        Authenticator::new(UserStore::new(dir.path().join("users.json")), scheme)
    }

    fn ana() -> RegistrationForm {
        RegistrationForm {
            full_name: "Ana Silva".to_string(),
            grant_type: GrantType::IniciacaoCientifica,
            username: "ana".to_string(),
            password: "1234".to_string(),
        }
    }

    fn credentials(username: &str, password: &str) -> LoginForm {
        LoginForm {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn register_persists_record_and_shows_login() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        let mut session = Session::new();

        auth.register(&mut session, ana()).unwrap();

        assert_eq!(session.state(), AuthState::ShowLogin);
        assert!(!session.is_authenticated());
        let users = auth.store().load_all().unwrap();
        let record = &users["ana"];
        assert_eq!(record.full_name, "Ana Silva");
        assert_eq!(record.grant_type, GrantType::IniciacaoCientifica);
        assert_eq!(record.password, "1234");
        assert!(
            chrono::NaiveDateTime::parse_from_str(&record.created_at, CREATED_AT_FORMAT).is_ok()
        );
    }

    #[test]
    fn duplicate_registration_keeps_existing_record() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        auth.register(&mut Session::new(), ana()).unwrap();
        let before = auth.store().load_all().unwrap();

        let mut session = Session::new();
        let mut again = ana();
        again.full_name = "Outra Ana".to_string();
        again.password = "zzz".to_string();
        let err = auth.register(&mut session, again).unwrap_err();

        assert!(matches!(err, AuthError::DuplicateUsername { ref username } if username == "ana"));
        assert_eq!(session.state(), AuthState::ShowRegister);
        assert_eq!(auth.store().load_all().unwrap(), before);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        auth.register(&mut Session::new(), ana()).unwrap();

        let mut upper = ana();
        upper.username = "Ana".to_string();
        auth.register(&mut Session::new(), upper).unwrap();

        assert_eq!(auth.store().load_all().unwrap().len(), 2);
        assert!(matches!(
            auth.login(&mut Session::new(), credentials("ANA", "1234")),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn empty_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        let mut form = ana();
        form.password = String::new();

        let err = auth.register(&mut Session::new(), form).unwrap_err();
        assert!(matches!(err, AuthError::MissingField { field: "password" }));
        assert!(auth.store().load_all().unwrap().is_empty());
    }

    #[test]
    fn login_populates_session() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        auth.register(&mut Session::new(), ana()).unwrap();

        let mut session = Session::new();
        session.show_login = true;
        let record = auth.login(&mut session, credentials("ana", "1234")).unwrap();
        assert_eq!(record.full_name, "Ana Silva");

        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(session.username.as_deref(), Some("ana"));
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_alike() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        auth.register(&mut Session::new(), ana()).unwrap();

        let mut session = Session::new();
        session.show_login = true;
        let wrong = auth.login(&mut session, credentials("ana", "wrong")).unwrap_err();
        let unknown = auth.login(&mut session, credentials("bob", "x")).unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(session.state(), AuthState::ShowLogin);
    }

    #[test]
    fn corrupt_store_surfaces_on_login() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("users.json"), "[]").unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);

        let err = auth.login(&mut Session::new(), credentials("ana", "1234")).unwrap_err();
        assert!(matches!(err, AuthError::Store(ref s) if s.is_read()));
    }

    #[test]
    fn argon2_scheme_never_stores_plaintext() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Argon2);
        auth.register(&mut Session::new(), ana()).unwrap();

        let stored = &auth.store().load_all().unwrap()["ana"].password;
        assert_ne!(stored, "1234");

        let mut session = Session::new();
        auth.login(&mut session, credentials("ana", "1234")).unwrap();
        assert!(session.is_authenticated());
        assert!(matches!(
            auth.login(&mut Session::new(), credentials("ana", "4321")),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn logout_returns_to_login_form() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        auth.register(&mut Session::new(), ana()).unwrap();
        let mut session = Session::new();
        auth.login(&mut session, credentials("ana", "1234")).unwrap();

        auth.logout(&mut session);

        assert_eq!(session.state(), AuthState::ShowLogin);
        assert!(session.user.is_none());
        assert!(session.username.is_none());
    }

    #[test]
    fn concurrent_registrations_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let auth = std::sync::Arc::new(authenticator(&dir, PasswordScheme::Plaintext));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let auth = std::sync::Arc::clone(&auth);
                std::thread::spawn(move || {
                    let mut form = ana();
                    form.username = format!("user{}", i);
                    auth.register(&mut Session::new(), form)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let users = auth.store().load_all().unwrap();
        assert_eq!(users.len(), 16);
        for i in 0..16 {
            assert!(users.contains_key(&format!("user{}", i)));
        }
    }

    #[test]
    fn form_toggle_switches_pages() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, PasswordScheme::Plaintext);
        let mut session = Session::new();

        auth.show_login(&mut session);
        assert_eq!(session.state(), AuthState::ShowLogin);
        auth.show_register(&mut session);
        assert_eq!(session.state(), AuthState::ShowRegister);
    }
}
