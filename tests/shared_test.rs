//! Process-wide store access.
//!
//! Kept in its own test binary because the shared store is global state.

use jsonkv::{SetMode, Store, StoreError};
use serde_json::{json, Value};
use tempfile::TempDir;

#[tokio::test]
async fn test_shared_store_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("shared.db");
    let other_path = temp_dir.path().join("other.db");

    // First call opens.
    let first = Store::shared(&path).unwrap();
    first.prepare_collection("items").await.unwrap();
    first
        .set_by_key("items", "k", json!(1), SetMode::Insert)
        .await
        .unwrap();

    // Same path returns the same connection.
    let second = Store::shared(&path).unwrap();
    let loaded: Option<Value> = second.get_by_key("items", "k").await.unwrap();
    assert_eq!(loaded, Some(json!(1)));

    // A different path is refused rather than silently ignored.
    let err = Store::shared(&other_path).unwrap_err();
    match err {
        StoreError::AlreadyOpen { open, requested } => {
            assert_eq!(open, std::fs::canonicalize(&path).unwrap());
            assert_eq!(requested, other_path);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Once closed, the shared slot can be reopened elsewhere.
    first.close().await.unwrap();
    assert!(second.is_closed());
    let third = Store::shared(&other_path).unwrap();
    assert!(!third.is_closed());
    third.prepare_collection("items").await.unwrap();
}
