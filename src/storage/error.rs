//! Error type shared by every store operation.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors surfaced by the store.
///
/// Absence of a key is not an error; lookups return `Option`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key {key:?} already exists in collection {collection}")]
    ConstraintViolation { collection: String, key: String },

    #[error("invalid collection name {name:?}: {reason}")]
    InvalidCollectionName { name: String, reason: &'static str },

    #[error("malformed query on collection {collection}: {message}")]
    MalformedQuery { collection: String, message: String },

    #[error("failed to decode value for key {key:?} in collection {collection}: {source}")]
    Decode {
        collection: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("store already open at {open}, refusing to reopen at {requested}")]
    AlreadyOpen { open: PathBuf, requested: PathBuf },

    #[error("store worker has shut down")]
    ChannelClosed,

    #[error("store worker panicked")]
    WorkerPanic,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    /// Classify an engine error raised while running a statement.
    ///
    /// `key` is the bound key, if the statement had one, so constraint
    /// violations can name it.
    pub(crate) fn from_statement(
        err: rusqlite::Error,
        path: &std::path::Path,
        collection: &str,
        key: Option<&str>,
    ) -> Self {
        let (code, message) = match &err {
            rusqlite::Error::SqliteFailure(e, msg) => (e.code, msg.clone()),
            _ => return StoreError::Database(err),
        };

        match code {
            ErrorCode::ConstraintViolation => StoreError::ConstraintViolation {
                collection: collection.to_string(),
                key: key.unwrap_or_default().to_string(),
            },
            ErrorCode::CannotOpen
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt => StoreError::StorageUnavailable {
                path: path.to_path_buf(),
                source: err,
            },
            ErrorCode::Unknown => StoreError::MalformedQuery {
                collection: collection.to_string(),
                message: message.unwrap_or_else(|| err.to_string()),
            },
            _ => StoreError::Database(err),
        }
    }

    /// True for the duplicate-key failure of an insert.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}
