use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::password::PasswordScheme;

/// Grant dashboard web server
#[derive(Parser, Debug, Clone)]
#[command(name = "grantboard")]
#[command(about = "Login-gated grant dashboard backed by a JSON users file")]
#[command(version)]
pub struct Config {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1", env = "GRANTBOARD_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "GRANTBOARD_PORT")]
    pub port: u16,

    /// JSON file holding the registered users
    #[arg(
        long,
        default_value = "database/users.json",
        env = "GRANTBOARD_USERS_FILE"
    )]
    pub users_file: PathBuf,

    /// JSON file overriding the user-facing messages
    #[arg(long, env = "GRANTBOARD_MESSAGES_FILE")]
    pub messages_file: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long, default_value = "static", env = "GRANTBOARD_STATIC_DIR")]
    pub static_dir: PathBuf,

    /// How passwords are stored in the users file
    #[arg(
        long,
        value_enum,
        default_value = "plaintext",
        env = "GRANTBOARD_PASSWORD_SCHEME"
    )]
    pub password_scheme: PasswordScheme,

    /// Seconds of inactivity after which a session is dropped
    #[arg(long, default_value_t = 24 * 60 * 60, env = "GRANTBOARD_SESSION_TTL")]
    pub session_ttl_secs: u64,
}

impl Config {
    /// Get the address to listen on
    ///
    /// # Returns
    /// * `String` - `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the idle time after which a session is dropped
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
