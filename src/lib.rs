/*!
# Grant Dashboard

A small web dashboard for scholarship holders, gated behind a username/password
login and backed by a flat JSON file of user records.

## Overview

Visitors first see a registration form (full name, grant type, username,
password). After registering they are sent to the login form; a successful
login marks their browser session as authenticated and hands them over to
the dashboard page.

## Architecture

### Persistence Layer
- A single JSON object mapping username to `{nome, bolsa, senha, created_at}`
- Re-read on every operation, rewritten in full through a temp file and rename
- Registrations are serialized inside the process; other processes writing
  the same file are not coordinated with

### Authentication Layer
- `Authenticator` drives registration, login and logout
- `Session` holds the logged-in user and which form to show; sessions live in
  a `SessionStore` owned by the application, keyed by a cookie token
- Passwords are stored as typed unless the Argon2 scheme is configured

### Web Layer (feature `web`)
- axum router, handlebars pages, localized message table

## Modules

- **store**: user records and the JSON file store
- **password**: plaintext and Argon2 password schemes
- **session**: per-browser session state and storage
- **login**: authenticator and its form handlers
- **messages**: localized user-facing strings
- **config**: command line and environment configuration
- **templates**: HTML pages
- **app**: routing and server startup
*/

pub mod config;
pub mod login;
pub mod messages;
pub mod password;
pub mod session;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod templates;

pub use config::Config;
pub use login::{AuthError, Authenticator, LoginForm, RegistrationForm};
pub use messages::{Messages, Notice};
pub use password::PasswordScheme;
pub use session::{AuthState, Session, SessionStore};
pub use store::{GrantType, StoreError, UserMap, UserRecord, UserStore};
