#![cfg(not(tarpaulin_include))]

use clap::Parser;
use grantboard::{Config, app};

/// Main entry point for the grant dashboard web server
///
/// Reads configuration from the command line and `GRANTBOARD_*` environment
/// variables, sets up logging (`RUST_LOG`, default `info`) and serves until
/// interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    app::run(config).await
}
