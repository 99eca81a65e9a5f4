use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::login::{self, Authenticator};
use crate::messages::Messages;
use crate::session::SessionStore;
use crate::store::UserStore;
use crate::templates::PageRenderer;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "grantboard_session";

/// Shared application state
///
/// Holds the authenticator, the live sessions and the page renderer. Handlers
/// receive it as `State<Arc<AppState>>`.
pub struct AppState {
    pub authenticator: Authenticator,
    pub sessions: SessionStore,
    pub pages: PageRenderer,
}

impl AppState {
    /// Build the application state from the configuration
    ///
    /// # Arguments
    /// * `config` - Parsed command line and environment settings
    ///
    /// # Returns
    /// * `Result<AppState, Box<dyn Error>>` - The state, or an error if the
    ///   message file cannot be loaded or the templates do not compile
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let messages = Messages::load(config.messages_file.as_deref())?;
        let store = UserStore::new(&config.users_file);

        Ok(AppState {
            authenticator: Authenticator::new(store, config.password_scheme),
            sessions: SessionStore::new(config.session_ttl()),
            pages: PageRenderer::new(messages)?,
        })
    }
}

/// Build the router for all pages
///
/// # Arguments
/// * `state` - Shared application state
/// * `static_dir` - Directory served under `/static`
///
/// # Returns
/// * `Router` - The configured router
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(login::serve_entry_page))
        .route("/register", post(login::handle_register))
        .route("/login", post(login::handle_login))
        .route("/show-login", post(login::handle_show_login))
        .route("/show-register", post(login::handle_show_register))
        .route("/logout", post(login::handle_logout))
        .route("/dashboard", get(serve_dashboard))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Run the web server
///
/// Serves until Ctrl-C is received, then finishes in-flight requests.
///
/// # Arguments
/// * `config` - Server configuration
///
/// # Returns
/// * `Result<(), Box<dyn Error>>` - Success or an error from startup or serving
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_config(&config)?);
    log::info!(
        "using user store {} ({:?} passwords)",
        state.authenticator.store().path().display(),
        config.password_scheme
    );

    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received");
}

/// Handler for GET /dashboard - landing page for logged-in users
async fn serve_dashboard(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (_, session) = login::session_from_jar(&state, &jar);

    let (Some(username), Some(user)) = (&session.username, &session.user) else {
        return Redirect::to("/").into_response();
    };

    match state.pages.dashboard_page(username, user) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            log::error!("failed to render dashboard: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}
