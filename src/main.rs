#![cfg(not(tarpaulin_include))]

use calculator::app;
use calculator::config::Config;
use std::env;

/// Main entry point for the calculator web service
///
/// Loads configuration from `CALC_*` environment variables; optional
/// `host port` arguments override the bind address.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = Config::from_env()?.with_args(&args)?;

    log::info!(
        "Starting calculator service (max text {} chars, max tree {} slots, {} records per user)",
        config.limits.max_text_len,
        config.limits.max_tree_slots,
        config.max_history_per_user
    );
    app::run(config).await
}
