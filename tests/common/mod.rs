//! Test utilities for jsonkv integration tests.
//!
//! Provides:
//! - Temporary database fixtures
//! - An opened store over the fixture

#![allow(dead_code)]

use jsonkv::Store;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        jsonkv::observability::tracing::init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Get the database path as a string.
    pub fn db_path_str(&self) -> &str {
        self.db_path.to_str().expect("invalid path")
    }

    /// Open a store over the fixture database.
    pub fn open(&self) -> Store {
        Store::open(&self.db_path).expect("failed to open store")
    }

    /// Open a store and prepare `collection` in it.
    pub async fn open_with_collection(&self, collection: &str) -> Store {
        let store = self.open();
        store
            .prepare_collection(collection)
            .await
            .expect("failed to prepare collection");
        store
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort entries by id so tests can ignore scan order.
pub fn sorted_ids<T>(entries: &[jsonkv::Entry<T>]) -> Vec<String> {
    let mut ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.temp_dir.path().exists());
        assert!(fixture.db_path_str().contains("test.db"));
    }
}
