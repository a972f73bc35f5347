//! jsonkv: a key-value store of JSON documents over SQLite.
//!
//! Values of any serde type are stored as JSON text under a string id, in
//! named collections that each map to one `(ID TEXT PRIMARY KEY, json TEXT)`
//! table.
//!
//! # Architecture
//!
//! - **One connection**: a dedicated worker thread owns the only SQLite
//!   connection and runs statements in submission order
//! - **Async API**: every operation awaits a reply from the worker
//! - **Safe statements**: collection names are allow-listed, everything
//!   else is a bound parameter
//! - **Observable**: `tracing` spans around every operation
//!
//! # Modules
//!
//! - [`cli`]: Command execution for the `jsonkv` binary
//! - [`config`]: CLI and environment configuration
//! - [`observability`]: Tracing setup
//! - [`storage`]: SQLite persistence layer
//! - [`store`]: The public key-value adapter

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // storage::error::StoreError is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes  // r#""# is fine for SQL
)]

pub mod cli;
pub mod config;
pub mod observability;
pub mod storage;
pub mod store;

pub use config::StoreConfig;
pub use storage::{CollectionName, StoreError};
pub use store::{Entry, SetMode, Store};
