#![cfg(not(tarpaulin_include))]

use asset_ledger::app;
use asset_ledger::config::{Args, init_logging};

/// Main entry point for the web application
///
/// Reads the configuration from the command line, the environment and `.env`, then
/// serves the ledger API on the configured address.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::load();
    init_logging(&args.log_level);

    app::run(args).await
}
