//! Configuration parsing for jsonkv.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the database file.
pub const DEFAULT_DB_PATH: &str = "./data/jsonkv.db";

/// Store settings, usable on their own or flattened into a CLI.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[arg(short, long, env = "JSONKV_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Size of the request channel to the store worker (backpressure control)
    #[arg(long, env = "JSONKV_CHANNEL_SIZE", default_value_t = 256)]
    pub channel_size: usize,

    /// How long a statement waits on a locked database file, in milliseconds
    #[arg(long, env = "JSONKV_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    /// Default settings for the database at `db_path`.
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            channel_size: 256,
            busy_timeout_ms: 5000,
        }
    }
}

/// jsonkv: a key-value store of JSON documents over SQLite.
#[derive(Parser, Debug, Clone)]
#[command(name = "jsonkv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Config {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "JSONKV_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a collection if it does not exist
    Prepare {
        /// Collection name
        collection: String,
    },
    /// Print the value stored under a key
    Get {
        /// Collection name
        collection: String,
        /// Entry id
        key: String,
    },
    /// Print every entry in a collection
    List {
        /// Collection name
        collection: String,
    },
    /// Print every entry whose id starts with a prefix
    Prefix {
        /// Collection name
        collection: String,
        /// Id prefix
        prefix: String,
    },
    /// Store a JSON value under a key
    Set {
        /// Collection name
        collection: String,
        /// Entry id
        key: String,
        /// Value as JSON text
        value: String,
        /// Replace an existing entry instead of inserting
        #[arg(long, conflicts_with = "upsert")]
        update: bool,
        /// Insert, or replace if the key exists
        #[arg(long)]
        upsert: bool,
    },
    /// Delete the entry under a key
    Delete {
        /// Collection name
        collection: String,
        /// Entry id
        key: String,
    },
    /// Delete every entry in a collection
    Clear {
        /// Collection name
        collection: String,
    },
    /// Print the number of entries in a collection
    Count {
        /// Collection name
        collection: String,
    },
}
