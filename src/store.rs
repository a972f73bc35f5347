//! The key-value store adapter.
//!
//! A [`Store`] addresses named collections, each a SQLite table of
//! `(ID TEXT PRIMARY KEY, json TEXT)`. Values are encoded to JSON before
//! they are queued and decoded after the reply arrives, so the worker thread
//! only ever handles text.
//!
//! ```no_run
//! # async fn demo() -> Result<(), jsonkv::StoreError> {
//! use jsonkv::{SetMode, Store};
//! use serde_json::json;
//!
//! let store = Store::open("data/app.db")?;
//! store.prepare_collection("items").await?;
//! store.set_by_key("items", "a", json!({"n": 1}), SetMode::Insert).await?;
//! let value: Option<serde_json::Value> = store.get_by_key("items", "a").await?;
//! assert_eq!(value, Some(json!({"n": 1})));
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::StoreConfig;
use crate::storage::{CollectionName, RawEntry, StoreError, Worker, WorkerHandle};

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<T = serde_json::Value> {
    pub id: String,
    pub value: T,
}

/// How [`Store::set_by_key`] writes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Insert a new entry. Fails with `ConstraintViolation` if the key exists.
    #[default]
    Insert,
    /// Replace an existing entry. A missing key is left missing.
    Update,
    /// Insert, or replace if the key exists.
    Upsert,
}

impl SetMode {
    /// Map an "is this an update" flag onto `Update` or `Insert`.
    pub fn from_update_flag(is_update: bool) -> Self {
        if is_update {
            SetMode::Update
        } else {
            SetMode::Insert
        }
    }
}

/// Process-wide store for [`Store::shared`].
static SHARED: Mutex<Option<Store>> = Mutex::new(None);

/// A JSON key-value store over one SQLite connection.
///
/// Clones share the connection. Construct one at startup and pass it to
/// whatever needs it.
#[derive(Clone)]
pub struct Store {
    handle: WorkerHandle,
    /// Taken and joined by the first [`Store::close`].
    worker: Arc<Mutex<Option<Worker>>>,
    path: Arc<PathBuf>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

impl Store {
    /// Open (creating if absent) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(&StoreConfig::new(path.as_ref()))
    }

    /// Open a store from configuration.
    ///
    /// Creates the parent directory of the database file if needed.
    pub fn open_with(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = &config.db_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let worker = Worker::spawn(path, config.busy_timeout(), config.channel_size)?;
        Ok(Self {
            handle: worker.handle(),
            worker: Arc::new(Mutex::new(Some(worker))),
            path: Arc::new(normalize(path)),
        })
    }

    /// The process-wide store.
    ///
    /// The first call opens `path`. Later calls with the same path return
    /// the same store; a different path fails with `AlreadyOpen`. A shared
    /// store that has been closed is reopened.
    pub fn shared(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let requested = normalize(path.as_ref());
        let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(store) = slot.as_ref().filter(|s| !s.is_closed()) {
            if *store.path == requested {
                return Ok(store.clone());
            }
            return Err(StoreError::AlreadyOpen {
                open: store.path.to_path_buf(),
                requested,
            });
        }

        let store = Store::open(path)?;
        *slot = Some(store.clone());
        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once [`Store::close`] has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Ensure `collection` exists. Preparing an existing collection is a no-op.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn prepare_collection(&self, collection: &str) -> Result<(), StoreError> {
        let name = CollectionName::new(collection)?;
        self.handle.prepare(name).await?;
        tracing::debug!("Collection ready");
        Ok(())
    }

    /// Every entry in `collection`, in no particular order.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<Entry<T>>, StoreError> {
        let name = CollectionName::new(collection)?;
        let rows = self.handle.select_all(name.clone()).await?;
        tracing::debug!(rows = rows.len(), "Loaded collection");
        decode_entries(&name, rows)
    }

    /// The value stored under `key`, or `None` if there is none.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_by_key<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let name = CollectionName::new(collection)?;
        let json = self
            .handle
            .select_by_key(name.clone(), key.to_string())
            .await?;
        tracing::debug!(found = json.is_some(), "Looked up key");
        json.map(|json| decode(&name, key, &json)).transpose()
    }

    /// Every entry whose id starts with `prefix`, in no particular order.
    ///
    /// The prefix is matched literally, ignoring case for ASCII letters;
    /// wildcard characters in it carry no special meaning.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_by_prefix<T: DeserializeOwned>(
        &self,
        collection: &str,
        prefix: &str,
    ) -> Result<Vec<Entry<T>>, StoreError> {
        let name = CollectionName::new(collection)?;
        let rows = self
            .handle
            .select_by_prefix(name.clone(), prefix.to_string())
            .await?;
        tracing::debug!(rows = rows.len(), "Prefix scan complete");
        decode_entries(&name, rows)
    }

    /// Store `value` under `key` and hand it back.
    ///
    /// See [`SetMode`] for how an existing or missing key is treated. An
    /// `Update` of a missing key succeeds without writing anything.
    #[tracing::instrument(skip(self, value), level = "debug")]
    pub async fn set_by_key<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        value: T,
        mode: SetMode,
    ) -> Result<T, StoreError> {
        let name = CollectionName::new(collection)?;
        let json = serde_json::to_string(&value).map_err(StoreError::Encode)?;
        let affected = self
            .handle
            .write(name, key.to_string(), json, mode)
            .await?;

        if affected == 0 {
            tracing::debug!("Update matched no entry");
        } else {
            tracing::debug!(affected, "Value written");
        }
        Ok(value)
    }

    /// Remove every entry in `collection`, returning how many were removed.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
        let name = CollectionName::new(collection)?;
        let removed = self.handle.delete_all(name).await?;
        tracing::debug!(removed, "Collection cleared");
        Ok(removed)
    }

    /// Remove the entry under `key`, returning 1 if it existed and 0 otherwise.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delete_by_key(&self, collection: &str, key: &str) -> Result<usize, StoreError> {
        let name = CollectionName::new(collection)?;
        let removed = self.handle.delete_by_key(name, key.to_string()).await?;
        tracing::debug!(removed, "Key deleted");
        Ok(removed)
    }

    /// Number of entries in `collection`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let name = CollectionName::new(collection)?;
        self.handle.count(name).await
    }

    /// Stop the worker and close the connection.
    ///
    /// Calls already queued complete first; later calls on any clone fail
    /// with `ChannelClosed`. Returns `WorkerPanic` if the worker thread
    /// died instead of shutting down.
    pub async fn close(&self) -> Result<(), StoreError> {
        let shutdown = self.handle.shutdown().await;
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            // The thread has acked the shutdown or already died, so this
            // returns promptly.
            worker.join()?;
        }
        shutdown?;
        tracing::info!(path = %self.path.display(), "Store closed");
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(
    collection: &CollectionName,
    key: &str,
    json: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(|source| StoreError::Decode {
        collection: collection.to_string(),
        key: key.to_string(),
        source,
    })
}

fn decode_entries<T: DeserializeOwned>(
    collection: &CollectionName,
    rows: Vec<RawEntry>,
) -> Result<Vec<Entry<T>>, StoreError> {
    rows.into_iter()
        .map(|row| {
            let value = decode(collection, &row.id, &row.json)?;
            Ok(Entry { id: row.id, value })
        })
        .collect()
}

/// Canonical form of a database path, falling back to the path as given
/// when it does not exist yet.
fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
