//! SQLite storage layer for jsonkv.
//!
//! Provides:
//! - Collection name validation
//! - Connection pragmas and per-collection statements
//! - A dedicated worker thread owning the single connection
//! - The error taxonomy shared by every operation

pub mod collection;
pub mod error;
pub mod schema;
pub mod worker;

pub use collection::CollectionName;
pub use error::StoreError;
pub use worker::{RawEntry, Worker, WorkerHandle};
