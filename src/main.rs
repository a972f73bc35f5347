//! jsonkv: command-line access to a JSON key-value store.
//!
//! # Usage
//!
//! ```bash
//! jsonkv --db-path ./data/app.db prepare items
//! jsonkv --db-path ./data/app.db set items a '{"n":1}'
//! jsonkv --db-path ./data/app.db get items a
//! ```
//!
//! Environment variables can also be used:
//! - `JSONKV_DB_PATH`: Database file
//! - `JSONKV_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
//! - `RUST_LOG`: Full tracing filter, overrides the log level

use anyhow::Result;
use jsonkv::cli::{self, Outcome};
use jsonkv::config::Config;
use jsonkv::observability::tracing::init_tracing;
use jsonkv::Store;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    let store = Store::open_with(&config.store)?;
    let mut stdout = std::io::stdout();
    let outcome = cli::run(&store, config.command, config.output, &mut stdout).await;

    // Flush pending work and close the connection even if the command failed
    store.close().await?;

    match outcome? {
        Outcome::Done => Ok(ExitCode::SUCCESS),
        Outcome::NotFound => Ok(ExitCode::FAILURE),
    }
}
