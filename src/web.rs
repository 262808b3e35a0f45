#![cfg(not(tarpaulin_include))]

use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use sheetdesk::app;
use sheetdesk::config::Config;

/// Main entry point for the web application
///
/// Reads the server configuration from flags or `SHEETDESK_*` environment
/// variables and serves the settlement and linter tools until the process
/// is stopped.
///
/// # Returns
/// * `anyhow::Result<()>` - Success, or the bind/serve error
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    info!(
        "Starting sheetdesk on {} (uploads up to {} MiB)",
        config.bind_addr(),
        config.max_upload_mb
    );

    app::run(config).await?;
    Ok(())
}
