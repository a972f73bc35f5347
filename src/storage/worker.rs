//! Dedicated thread owning the store's single SQLite connection.
//!
//! Callers submit requests over a bounded channel and await a oneshot
//! reply, so every operation is an async suspension point while statements
//! run one at a time in submission order on the worker thread.

use rusqlite::{named_params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::collection::CollectionName;
use super::error::StoreError;
use super::schema::{apply_pragmas, prefix_pattern, CollectionStatements};
use crate::store::SetMode;

/// A stored row before its JSON is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: String,
    pub json: String,
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Requests handled by the worker thread.
enum Request {
    Prepare {
        collection: CollectionName,
        reply: Reply<()>,
    },
    SelectAll {
        collection: CollectionName,
        reply: Reply<Vec<RawEntry>>,
    },
    SelectByKey {
        collection: CollectionName,
        key: String,
        reply: Reply<Option<String>>,
    },
    SelectByPrefix {
        collection: CollectionName,
        prefix: String,
        reply: Reply<Vec<RawEntry>>,
    },
    Write {
        collection: CollectionName,
        key: String,
        json: String,
        mode: SetMode,
        reply: Reply<usize>,
    },
    DeleteAll {
        collection: CollectionName,
        reply: Reply<usize>,
    },
    DeleteByKey {
        collection: CollectionName,
        key: String,
        reply: Reply<usize>,
    },
    Count {
        collection: CollectionName,
        reply: Reply<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    #[cfg(test)]
    Panic,
}

/// Handle for submitting requests to the worker.
///
/// Cheap to clone; all clones feed the same connection.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Request>,
}

impl WorkerHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn prepare(&self, collection: CollectionName) -> Result<(), StoreError> {
        self.call(|reply| Request::Prepare { collection, reply })
            .await
    }

    pub async fn select_all(
        &self,
        collection: CollectionName,
    ) -> Result<Vec<RawEntry>, StoreError> {
        self.call(|reply| Request::SelectAll { collection, reply })
            .await
    }

    pub async fn select_by_key(
        &self,
        collection: CollectionName,
        key: String,
    ) -> Result<Option<String>, StoreError> {
        self.call(|reply| Request::SelectByKey {
            collection,
            key,
            reply,
        })
        .await
    }

    pub async fn select_by_prefix(
        &self,
        collection: CollectionName,
        prefix: String,
    ) -> Result<Vec<RawEntry>, StoreError> {
        self.call(|reply| Request::SelectByPrefix {
            collection,
            prefix,
            reply,
        })
        .await
    }

    /// Write `json` under `key`, returning the number of rows affected.
    pub async fn write(
        &self,
        collection: CollectionName,
        key: String,
        json: String,
        mode: SetMode,
    ) -> Result<usize, StoreError> {
        self.call(|reply| Request::Write {
            collection,
            key,
            json,
            mode,
            reply,
        })
        .await
    }

    pub async fn delete_all(&self, collection: CollectionName) -> Result<usize, StoreError> {
        self.call(|reply| Request::DeleteAll { collection, reply })
            .await
    }

    pub async fn delete_by_key(
        &self,
        collection: CollectionName,
        key: String,
    ) -> Result<usize, StoreError> {
        self.call(|reply| Request::DeleteByKey {
            collection,
            key,
            reply,
        })
        .await
    }

    pub async fn count(&self, collection: CollectionName) -> Result<usize, StoreError> {
        self.call(|reply| Request::Count { collection, reply })
            .await
    }

    /// Ask the worker to stop.
    ///
    /// Requests queued before this one are still answered. Returns once the
    /// connection has been closed.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Shutdown { reply })
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)
    }

    /// Make the worker thread panic.
    #[cfg(test)]
    pub(crate) async fn panic_worker(&self) {
        let _ = self.tx.send(Request::Panic).await;
    }

    /// True once the worker has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The worker thread and a handle to it.
pub struct Worker {
    thread: JoinHandle<()>,
    handle: WorkerHandle,
}

impl Worker {
    /// Open the database at `path` and start the worker thread.
    ///
    /// The connection is opened on the calling thread so open failures are
    /// reported here rather than on the first request.
    pub fn spawn(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
        channel_size: usize,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source| StoreError::StorageUnavailable {
            path: path.clone(),
            source,
        };

        let conn = Connection::open(&path).map_err(unavailable)?;
        apply_pragmas(&conn, busy_timeout).map_err(unavailable)?;

        let (tx, rx) = mpsc::channel(channel_size.max(1));
        let state = WorkerState {
            conn,
            path: path.clone(),
        };
        let thread = thread::Builder::new()
            .name("jsonkv-worker".into())
            .spawn(move || run(state, rx))
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), channel_size, "Store worker started");

        Ok(Self {
            thread,
            handle: WorkerHandle { tx },
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Wait for the worker thread to exit.
    ///
    /// The thread exits after a shutdown request or once every handle has
    /// been dropped.
    pub fn join(self) -> Result<(), StoreError> {
        let Worker { thread, handle } = self;
        drop(handle);
        thread.join().map_err(|_| StoreError::WorkerPanic)
    }
}

fn run(state: WorkerState, mut rx: mpsc::Receiver<Request>) {
    let mut shutdown_reply = None;

    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Shutdown { reply } => {
                shutdown_reply = Some(reply);
                break;
            }
            request => state.handle(request),
        }
    }

    // Anything still queued is answered with ChannelClosed when rx drops.
    rx.close();
    drop(rx);
    drop(state);
    tracing::info!("Store worker stopped");

    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

struct WorkerState {
    conn: Connection,
    path: PathBuf,
}

impl WorkerState {
    fn handle(&self, request: Request) {
        // Callers that gave up on a reply are not an error.
        match request {
            Request::Prepare { collection, reply } => {
                let _ = reply.send(self.prepare(&collection));
            }
            Request::SelectAll { collection, reply } => {
                let _ = reply.send(self.select_all(&collection));
            }
            Request::SelectByKey {
                collection,
                key,
                reply,
            } => {
                let _ = reply.send(self.select_by_key(&collection, &key));
            }
            Request::SelectByPrefix {
                collection,
                prefix,
                reply,
            } => {
                let _ = reply.send(self.select_by_prefix(&collection, &prefix));
            }
            Request::Write {
                collection,
                key,
                json,
                mode,
                reply,
            } => {
                let _ = reply.send(self.write(&collection, &key, &json, mode));
            }
            Request::DeleteAll { collection, reply } => {
                let _ = reply.send(self.delete_all(&collection));
            }
            Request::DeleteByKey {
                collection,
                key,
                reply,
            } => {
                let _ = reply.send(self.delete_by_key(&collection, &key));
            }
            Request::Count { collection, reply } => {
                let _ = reply.send(self.count(&collection));
            }
            Request::Shutdown { .. } => unreachable!("shutdown is handled by the run loop"),
            #[cfg(test)]
            Request::Panic => panic!("worker panic requested"),
        }
    }

    fn classify<'a>(
        &'a self,
        collection: &'a CollectionName,
        key: Option<&'a str>,
    ) -> impl Fn(rusqlite::Error) -> StoreError + 'a {
        move |err| StoreError::from_statement(err, &self.path, collection.as_str(), key)
    }

    fn prepare(&self, collection: &CollectionName) -> Result<(), StoreError> {
        let stmts = CollectionStatements::new(collection);
        self.conn
            .execute_batch(&stmts.create)
            .map_err(self.classify(collection, None))
    }

    fn select_all(&self, collection: &CollectionName) -> Result<Vec<RawEntry>, StoreError> {
        let err = self.classify(collection, None);
        let stmts = CollectionStatements::new(collection);
        let mut stmt = self.conn.prepare_cached(&stmts.select_all).map_err(&err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawEntry {
                    id: row.get(0)?,
                    json: row.get(1)?,
                })
            })
            .map_err(&err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(&err)?;
        Ok(rows)
    }

    fn select_by_key(
        &self,
        collection: &CollectionName,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let err = self.classify(collection, Some(key));
        let stmts = CollectionStatements::new(collection);
        let mut stmt = self
            .conn
            .prepare_cached(&stmts.select_by_key)
            .map_err(&err)?;
        stmt.query_row(named_params! { ":key": key }, |row| row.get(0))
            .optional()
            .map_err(&err)
    }

    fn select_by_prefix(
        &self,
        collection: &CollectionName,
        prefix: &str,
    ) -> Result<Vec<RawEntry>, StoreError> {
        let err = self.classify(collection, None);
        let stmts = CollectionStatements::new(collection);
        let mut stmt = self
            .conn
            .prepare_cached(&stmts.select_by_prefix)
            .map_err(&err)?;
        let rows = stmt
            .query_map(named_params! { ":pattern": prefix_pattern(prefix) }, |row| {
                Ok(RawEntry {
                    id: row.get(0)?,
                    json: row.get(1)?,
                })
            })
            .map_err(&err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(&err)?;
        Ok(rows)
    }

    fn write(
        &self,
        collection: &CollectionName,
        key: &str,
        json: &str,
        mode: SetMode,
    ) -> Result<usize, StoreError> {
        let err = self.classify(collection, Some(key));
        let stmts = CollectionStatements::new(collection);
        let sql = match mode {
            SetMode::Insert => &stmts.insert,
            SetMode::Update => &stmts.update,
            SetMode::Upsert => &stmts.upsert,
        };
        let mut stmt = self.conn.prepare_cached(sql).map_err(&err)?;
        stmt.execute(named_params! { ":key": key, ":json": json })
            .map_err(&err)
    }

    fn delete_all(&self, collection: &CollectionName) -> Result<usize, StoreError> {
        let err = self.classify(collection, None);
        let stmts = CollectionStatements::new(collection);
        let mut stmt = self.conn.prepare_cached(&stmts.delete_all).map_err(&err)?;
        stmt.execute([]).map_err(&err)
    }

    fn delete_by_key(&self, collection: &CollectionName, key: &str) -> Result<usize, StoreError> {
        let err = self.classify(collection, Some(key));
        let stmts = CollectionStatements::new(collection);
        let mut stmt = self
            .conn
            .prepare_cached(&stmts.delete_by_key)
            .map_err(&err)?;
        stmt.execute(named_params! { ":key": key }).map_err(&err)
    }

    fn count(&self, collection: &CollectionName) -> Result<usize, StoreError> {
        let err = self.classify(collection, None);
        let stmts = CollectionStatements::new(collection);
        let mut stmt = self.conn.prepare_cached(&stmts.count).map_err(&err)?;
        let count: i64 = stmt.query_row([], |row| row.get(0)).map_err(&err)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
