//! Connection setup and per-collection statement text.
//!
//! Every collection shares one layout:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "<name>" (ID TEXT PRIMARY KEY, json TEXT)
//! ```

use rusqlite::Connection;
use std::time::Duration;

use super::collection::CollectionName;

/// Apply the pragmas used by the store's single connection.
///
/// - WAL journal so external readers do not block the store
/// - `synchronous = FULL` so an acknowledged write survives a crash
/// - a busy timeout for files shared with other processes
pub fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = FULL;
        "#,
    )?;
    Ok(())
}

/// Escape character declared in the prefix statement's `ESCAPE` clause.
const LIKE_ESCAPE: char = '\\';

/// Build a LIKE pattern matching every id that starts with `prefix`.
///
/// `%`, `_` and the escape character itself are escaped so the prefix
/// matches literally. LIKE ignores case for ASCII letters only.
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Statement text for one collection.
///
/// Only the quoted collection name is interpolated; keys, values and
/// prefixes are bound as `:key`, `:json` and `:pattern`.
#[derive(Debug, Clone)]
pub struct CollectionStatements {
    pub create: String,
    pub select_all: String,
    pub select_by_key: String,
    pub select_by_prefix: String,
    pub insert: String,
    pub update: String,
    pub upsert: String,
    pub delete_all: String,
    pub delete_by_key: String,
    pub count: String,
}

impl CollectionStatements {
    pub fn new(collection: &CollectionName) -> Self {
        let table = collection.quoted();
        Self {
            create: format!("CREATE TABLE IF NOT EXISTS {table} (ID TEXT PRIMARY KEY, json TEXT)"),
            select_all: format!("SELECT ID, json FROM {table}"),
            select_by_key: format!("SELECT json FROM {table} WHERE ID = :key"),
            select_by_prefix: format!(
                "SELECT ID, json FROM {table} WHERE ID LIKE :pattern ESCAPE '{LIKE_ESCAPE}'"
            ),
            insert: format!("INSERT INTO {table} (ID, json) VALUES (:key, :json)"),
            update: format!("UPDATE {table} SET json = :json WHERE ID = :key"),
            upsert: format!(
                "INSERT INTO {table} (ID, json) VALUES (:key, :json) \
                 ON CONFLICT(ID) DO UPDATE SET json = excluded.json"
            ),
            delete_all: format!("DELETE FROM {table}"),
            delete_by_key: format!("DELETE FROM {table} WHERE ID = :key"),
            count: format!("SELECT COUNT(*) FROM {table}"),
        }
    }
}
