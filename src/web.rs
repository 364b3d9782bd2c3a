#![cfg(not(tarpaulin_include))]

use attendance::app;
use attendance::config::Config;
use clap::Parser;

/// Main entry point for the attendance web server
///
/// Loads `.env` (if present), sets up logging and serves the JSON API until
/// the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    app::run(config).await
}
